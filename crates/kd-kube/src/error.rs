//! Error types for kd-kube

use thiserror::Error;

/// Result type for kd-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Reason kubectl prints for a missing object, as in `Error from server (NotFound): ...`
pub const NOT_FOUND_MARKER: &str = "(NotFound)";

/// Errors that can occur during cluster operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// kubectl could not be started at all
    #[error("failed to start kubectl: {0}")]
    ProcessStart(#[source] std::io::Error),

    /// A kubectl read command exited unsuccessfully
    #[error("kubectl {command} failed: {message}")]
    Command { command: String, message: String },

    /// Submitting a manifest failed; `message` is kubectl's stderr when it wrote any
    #[error("failed to {verb} {resource}: {message}")]
    Submission {
        verb: String,
        resource: String,
        message: String,
    },

    /// Existence could not be determined
    #[error("problem checking if resource {resource} exists: {source}")]
    ExistenceCheck {
        resource: String,
        #[source]
        source: Box<KubeError>,
    },

    /// The rollout did not converge before the deadline
    #[error("{kind} rolling update \"{name}\" timed out after {timeout}")]
    WatchTimeout {
        kind: String,
        name: String,
        timeout: String,
    },

    /// A newer rollout started while this one was being watched
    #[error("{kind} \"{name}\" update failed. It has been superseded by another update")]
    Superseded { kind: String, name: String },

    /// Status could not be fetched within the retry bound
    #[error("failed to fetch {kind} \"{name}\" status after {attempts} attempt(s): {source}")]
    FetchFailed {
        kind: String,
        name: String,
        attempts: u32,
        #[source]
        source: Box<KubeError>,
    },

    /// The created object's name was not in kubectl's confirmation
    #[error("could not read generated name from kubectl output: {output:?}")]
    GeneratedName { output: String },

    /// The resource has only a generateName, so it cannot be addressed
    #[error("{kind} with generateName \"{generate_name}\" has no name to {action}")]
    MissingName {
        kind: String,
        generate_name: String,
        action: String,
    },

    /// Status document could not be decoded
    #[error("failed to decode {kind} status: {message}")]
    Decode { kind: String, message: String },

    /// Certificate authority download failed
    #[error("problem downloading ca from {url}: {message}")]
    CaDownload { url: String, message: String },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KubeError {
    /// Check if kubectl reported a missing object
    ///
    /// Only kubectl's own message counts; the command line carries user
    /// supplied kinds and paths.
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::Command { message, .. } => message.contains(NOT_FOUND_MARKER),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found_uses_error_text() {
        let missing = KubeError::Command {
            command: "get Deployment/web".to_string(),
            message: "Error from server (NotFound): deployments.apps \"web\" not found".to_string(),
        };
        assert!(missing.is_not_found());

        let forbidden = KubeError::Command {
            command: "get Deployment/web".to_string(),
            message: "Error from server (Forbidden): access denied".to_string(),
        };
        assert!(!forbidden.is_not_found());
    }

    #[test]
    fn test_is_not_found_ignores_command_line() {
        let err = KubeError::Command {
            command: "get NotFoundWidget/web -o custom-columns=:.status.NotFound".to_string(),
            message: "error: the server doesn't have a resource type \"NotFoundWidget\"".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_timeout_message_names_resource() {
        let err = KubeError::WatchTimeout {
            kind: "Deployment".to_string(),
            name: "web".to_string(),
            timeout: "3m".to_string(),
        };
        assert_eq!(err.to_string(), "Deployment rolling update \"web\" timed out after 3m");
    }
}
