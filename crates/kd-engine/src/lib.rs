//! kd Engine - templating for Kubernetes manifests
//!
//! This crate provides a MiniJinja-based renderer with:
//! - The process environment as template variables
//! - `secret()` random secret generation (marks resources create-only)
//! - `k8lookup()` reads of live cluster fields through a [`Lookup`]
//! - `file()` / `file_with()` rendering of other template files
//! - YAML/JSON/base64 filters

pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;

pub use engine::{Engine, EngineBuilder, Lookup, LookupError, RenderOutput, Vars};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
