//! CLI error types with exit code handling

use kd_core::CoreError;
use kd_engine::{EngineError, TemplateError};
use kd_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// Every failure that ends a kd run
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid flags or environment
    #[error("{message}")]
    #[diagnostic(code(kd::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A template failed to render
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    /// A rendered document is not a usable manifest
    #[error(transparent)]
    #[diagnostic(code(kd::cli::manifest))]
    Manifest(#[from] CoreError),

    /// Talking to the cluster failed
    #[error(transparent)]
    #[diagnostic(code(kd::cli::kube))]
    Kube(#[from] KubeError),

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kd::cli::io))]
    Io { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        exit_codes::ERROR
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Template(e) => CliError::Template(e),
            other => CliError::Io {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
