//! Resource existence checks

use crate::client::ClusterClient;
use crate::error::Result;

/// Whether `kind/name` currently exists in the cluster
///
/// A "not found" answer is `Ok(false)`; any other failure is returned so
/// the caller never mistakes a broken connection for an absent object.
/// An empty name cannot exist and makes no call.
pub async fn resource_exists(client: &dyn ClusterClient, kind: &str, name: &str) -> Result<bool> {
    if name.is_empty() {
        return Ok(false);
    }

    match client.fetch_field(kind, name, ".metadata.name").await {
        Ok(found) => Ok(found == name),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
