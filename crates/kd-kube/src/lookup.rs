//! Cluster-backed `k8lookup()` for the template engine

use std::sync::Arc;

use kd_engine::{Lookup, LookupError};
use tokio::runtime::Handle;

use crate::client::ClusterClient;

/// Answers template lookups with live cluster fields
///
/// Rendering is synchronous, so each lookup blocks the current worker on
/// the async client. Requires the multi-threaded runtime.
pub struct ClusterLookup {
    client: Arc<dyn ClusterClient>,
    handle: Handle,
}

impl ClusterLookup {
    pub fn new(client: Arc<dyn ClusterClient>, handle: Handle) -> Self {
        Self { client, handle }
    }
}

impl Lookup for ClusterLookup {
    fn lookup(&self, kind: &str, name: &str, path: &str) -> Result<String, LookupError> {
        tracing::debug!(kind, name, path, "template lookup");
        tokio::task::block_in_place(|| self.handle.block_on(self.client.fetch_field(kind, name, path)))
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockClusterClient, NoopClient};
    use kd_engine::{Engine, Vars};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lookup_through_engine() {
        let client = MockClusterClient::new().with_field("Service", "db", ".spec.clusterIP", "10.0.0.12");
        let lookup = ClusterLookup::new(Arc::new(client), Handle::current());

        let engine = Engine::builder().lookup(Arc::new(lookup)).build();
        let out = engine
            .render_str(
                "host: {{ k8lookup('Service', 'db', '.spec.clusterIP') }}",
                "svc.yaml",
                &Vars::new(),
            )
            .unwrap();

        assert_eq!(out.text, "host: 10.0.0.12");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_object_fails() {
        let lookup = ClusterLookup::new(Arc::new(MockClusterClient::new()), Handle::current());

        let err = lookup.lookup("Service", "db", ".spec.clusterIP").unwrap_err();
        assert!(err.to_string().contains("NotFound"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dry_run_lookup() {
        let lookup = ClusterLookup::new(Arc::new(NoopClient), Handle::current());
        assert_eq!(lookup.lookup("Secret", "x", ".data").unwrap(), "noop");
    }
}
