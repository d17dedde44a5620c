//! Cluster clients
//!
//! kd talks to the cluster through three operations only:
//! - **fetch_field**: a single scalar at a field path (existence checks, `k8lookup`)
//! - **fetch_snapshot**: the status of a workload as a fresh [`StatusSnapshot`]
//! - **submit**: pipe a manifest to an imperative verb
//!
//! [`KubectlClient`] runs the real kubectl binary; [`NoopClient`] answers with
//! a sentinel for dry runs. One of the two is picked once at startup.

mod kubectl;
mod mock;
mod noop;
mod snapshot;

pub use kubectl::KubectlClient;
pub use mock::{GENERATED_SUFFIX, MockCall, MockClusterClient};
pub use noop::{NOOP_VALUE, NoopClient};
pub use snapshot::decode_snapshot;

use std::fmt;

use async_trait::async_trait;
use kd_core::StatusSnapshot;

use crate::error::Result;

/// Imperative kubectl verb used to submit a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Apply,
    Create,
    Replace,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Apply => "apply",
            Verb::Create => "create",
            Verb::Replace => "replace",
            Verb::Delete => "delete",
        }
    }

    /// Progress word used in log lines
    pub fn action(&self) -> &'static str {
        match self {
            Verb::Delete => "deleting",
            _ => "deploying",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured result of a submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOutput {
    pub stdout: String,
    pub stderr: String,

    /// Set when the process exited unsuccessfully
    pub exit_error: Option<String>,
}

impl SubmitOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn failure(stderr: impl Into<String>, exit_error: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_error: Some(exit_error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_error.is_none()
    }
}

/// Access to the cluster
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Read `path` (e.g. `.metadata.name`) of `kind/name`
    async fn fetch_field(&self, kind: &str, name: &str, path: &str) -> Result<String>;

    /// Fetch the current status of `kind/name`; a missing object is an error
    async fn fetch_snapshot(&self, kind: &str, name: &str) -> Result<StatusSnapshot>;

    /// Submit a manifest with the given verb
    async fn submit(&self, verb: Verb, manifest: &str) -> Result<SubmitOutput>;
}
