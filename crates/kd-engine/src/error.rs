//! Rendering errors

use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use minijinja::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to read template {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// What went wrong while rendering a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    /// An environment variable the manifest needs is not set
    MissingVariable,
    UnknownFunction,
    Syntax,
    /// A kd function (`secret`, `k8lookup`, `file`) or filter failed
    FunctionFailed,
    Other,
}

impl From<ErrorKind> for TemplateErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::UndefinedError => Self::MissingVariable,
            ErrorKind::UnknownFunction | ErrorKind::UnknownFilter => Self::UnknownFunction,
            ErrorKind::SyntaxError => Self::Syntax,
            ErrorKind::InvalidOperation => Self::FunctionFailed,
            _ => Self::Other,
        }
    }
}

impl TemplateErrorKind {
    fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingVariable => {
                Some("export the missing variable, or pass --allow-missing to render it empty")
            }
            Self::UnknownFunction => Some(
                "kd provides secret, k8lookup, file, file_with and the toyaml, tojson, \
                 fromyaml, fromjson, b64encode, b64decode filters",
            ),
            _ => None,
        }
    }
}

/// A manifest that failed to render, pointing at the offending line
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{file}: {reason}")]
#[diagnostic(code(kd::template::render))]
pub struct TemplateError {
    /// Manifest file the document came from
    pub file: String,
    pub reason: String,
    pub kind: TemplateErrorKind,

    #[source_code]
    pub document: NamedSource<String>,

    #[label("here")]
    pub location: Option<SourceSpan>,

    #[help]
    pub hint: Option<String>,
}

impl TemplateError {
    pub(crate) fn render_failed(err: minijinja::Error, file: &str, document: &str) -> Self {
        let kind = TemplateErrorKind::from(err.kind());
        let reason = err
            .detail()
            .map(|detail| format!("{}: {}", err.kind(), detail))
            .unwrap_or_else(|| err.kind().to_string());

        Self {
            file: file.to_string(),
            reason,
            kind,
            document: NamedSource::new(file, document.to_string()),
            location: err.line().and_then(|line| line_span(document, line)),
            hint: kind.hint().map(str::to_string),
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

/// Byte span of a 1-based line in `text`
fn line_span(text: &str, line: usize) -> Option<SourceSpan> {
    let start: usize = text
        .split_inclusive('\n')
        .take(line.checked_sub(1)?)
        .map(str::len)
        .sum();
    let content = text.get(start..)?.lines().next()?;

    Some(SourceSpan::new(start.into(), content.len()))
}
