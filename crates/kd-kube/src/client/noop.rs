//! Client used for dry runs

use async_trait::async_trait;
use kd_core::StatusSnapshot;

use super::{ClusterClient, SubmitOutput, Verb};
use crate::error::Result;

/// Value returned for every field lookup during a dry run
pub const NOOP_VALUE: &str = "noop";

/// Never contacts a cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClient;

#[async_trait]
impl ClusterClient for NoopClient {
    async fn fetch_field(&self, _kind: &str, _name: &str, _path: &str) -> Result<String> {
        Ok(NOOP_VALUE.to_string())
    }

    async fn fetch_snapshot(&self, _kind: &str, _name: &str) -> Result<StatusSnapshot> {
        Ok(StatusSnapshot::default())
    }

    async fn submit(&self, _verb: Verb, _manifest: &str) -> Result<SubmitOutput> {
        Ok(SubmitOutput::default())
    }
}
