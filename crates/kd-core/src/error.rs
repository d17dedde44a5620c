//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("failed to parse manifest from {file}: {error}")]
    ManifestParse {
        file: String,
        #[source]
        error: serde_yaml::Error,
    },

    #[error("manifest from {file} has no kind")]
    MissingKind { file: String },

    #[error("{}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("failed to walk {}: {error}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        error: walkdir::Error,
    },

    #[error("invalid resource reference '{reference}', expecting kind/name")]
    InvalidResourceRef { reference: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
