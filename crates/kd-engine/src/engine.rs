//! Template engine based on MiniJinja

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions;

/// Template variables, normally the process environment
pub type Vars = BTreeMap<String, String>;

pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

/// Source of live cluster values for the `k8lookup()` function
pub trait Lookup: Send + Sync {
    /// Read a single field of `kind/name` at a dotted `path`
    fn lookup(&self, kind: &str, name: &str, path: &str) -> std::result::Result<String, LookupError>;
}

struct UnavailableLookup;

impl Lookup for UnavailableLookup {
    fn lookup(&self, _kind: &str, _name: &str, _path: &str) -> std::result::Result<String, LookupError> {
        Err("no cluster connection configured".into())
    }
}

/// Nested `file()` renders allowed before giving up
const MAX_FILE_DEPTH: usize = 10;

/// Result of rendering one template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub text: String,

    /// `secret()` was called; the rendered resource must be create-only
    pub secret_used: bool,
}

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
    lookup: Option<Arc<dyn Lookup>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            strict_mode: true,
            lookup: None,
        }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Set the cluster lookup backing `k8lookup()`
    pub fn lookup(mut self, lookup: Arc<dyn Lookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            strict_mode: self.strict_mode,
            lookup: self.lookup.unwrap_or_else(|| Arc::new(UnavailableLookup)),
        }
    }
}

/// The template engine
pub struct Engine {
    strict_mode: bool,
    lookup: Arc<dyn Lookup>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Render a template string
    pub fn render_str(&self, template: &str, template_name: &str, vars: &Vars) -> Result<RenderOutput> {
        let state = RenderState {
            strict_mode: self.strict_mode,
            lookup: Arc::clone(&self.lookup),
            vars: Arc::new(vars.clone()),
            secret_used: Arc::new(AtomicBool::new(false)),
            depth: 0,
        };

        let text = state.render(template_name, template, vars)?;

        Ok(RenderOutput {
            text,
            secret_used: state.secret_used.load(Ordering::Relaxed),
        })
    }

    /// Read and render a template file
    pub fn render_file(&self, path: &Path, vars: &Vars) -> Result<RenderOutput> {
        let source = std::fs::read_to_string(path).map_err(|error| EngineError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        self.render_str(&source, &path.to_string_lossy(), vars)
    }
}

/// Everything a render (and its nested `file()` renders) shares
#[derive(Clone)]
pub(crate) struct RenderState {
    strict_mode: bool,
    pub(crate) lookup: Arc<dyn Lookup>,
    vars: Arc<Vars>,
    pub(crate) secret_used: Arc<AtomicBool>,
    depth: usize,
}

impl RenderState {
    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(UndefinedBehavior::Lenient);
        }
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);

        filters::register(&mut env);
        functions::register(&mut env, self);

        env
    }

    fn render(&self, name: &str, source: &str, vars: &Vars) -> Result<String> {
        let mut env = self.environment();

        env.add_template_owned(name.to_string(), source.to_string())
            .map_err(|e| TemplateError::render_failed(e, name, source))?;

        let tmpl = env
            .get_template(name)
            .map_err(|e| TemplateError::render_failed(e, name, source))?;

        let rendered = tmpl
            .render(vars)
            .map_err(|e| TemplateError::render_failed(e, name, source))?;

        // control-flow tags leave blank lines behind
        Ok(rendered.replace("\n\n", "\n"))
    }

    /// Render another template file with the base variables plus `extra`
    pub(crate) fn render_nested(
        &self,
        path: &str,
        extra: Option<Value>,
    ) -> std::result::Result<String, minijinja::Error> {
        if self.depth >= MAX_FILE_DEPTH {
            return Err(minijinja::Error::new(
                minijinja::ErrorKind::InvalidOperation,
                format!("file: nesting deeper than {} levels at {}", MAX_FILE_DEPTH, path),
            ));
        }

        let source = std::fs::read_to_string(path).map_err(|e| {
            minijinja::Error::new(
                minijinja::ErrorKind::InvalidOperation,
                format!("file: cannot read {}: {}", path, e),
            )
        })?;

        let mut vars = (*self.vars).clone();
        if let Some(extra) = extra {
            for key in extra.try_iter()? {
                let value = extra.get_item(&key)?;
                vars.insert(key.to_string(), value.to_string());
            }
        }

        let nested = RenderState {
            depth: self.depth + 1,
            ..self.clone()
        };

        nested
            .render(path, &source, &vars)
            .map_err(|e| minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string()))
    }
}
