//! Decoding fetched objects into status snapshots

use k8s_openapi::api::apps::v1::{DaemonSetStatus, DeploymentStatus, StatefulSetStatus};
use k8s_openapi::api::batch::v1::JobStatus;
use kd_core::{Kind, StatusSnapshot};
use serde::de::DeserializeOwned;

use crate::error::{KubeError, Result};

/// Build a fresh snapshot from a full object as returned by `kubectl get -o json`
///
/// Only the status fields meaningful for `kind` are read; the rest keep
/// their defaults.
pub fn decode_snapshot(kind: &Kind, object: &serde_json::Value) -> Result<StatusSnapshot> {
    let generation = object
        .get("metadata")
        .and_then(|m| m.get("generation"))
        .and_then(|g| g.as_i64());

    let mut snapshot = StatusSnapshot {
        generation,
        ..Default::default()
    };

    match kind {
        Kind::Deployment => {
            let status: DeploymentStatus = status_of(kind, object)?;
            snapshot.observed_generation = status.observed_generation;
            snapshot.replicas = status.replicas.unwrap_or(0);
            snapshot.updated_replicas = status.updated_replicas.unwrap_or(0);
            snapshot.available_replicas = status.available_replicas.unwrap_or(0);
            snapshot.unavailable_replicas = status.unavailable_replicas.unwrap_or(0);
        }
        Kind::StatefulSet => {
            let status: StatefulSetStatus = status_of(kind, object)?;
            snapshot.observed_generation = status.observed_generation;
            snapshot.ready_replicas = status.ready_replicas.unwrap_or(0);
            snapshot.current_revision = status.current_revision;
            snapshot.update_revision = status.update_revision;
        }
        Kind::DaemonSet => {
            let status: DaemonSetStatus = status_of(kind, object)?;
            snapshot.observed_generation = status.observed_generation;
            snapshot.desired_number_scheduled = status.desired_number_scheduled;
            snapshot.updated_number_scheduled = status.updated_number_scheduled.unwrap_or(0);
            snapshot.number_available = status.number_available.unwrap_or(0);
        }
        Kind::Job => {
            let status: JobStatus = status_of(kind, object)?;
            snapshot.succeeded = status.succeeded.unwrap_or(0);
        }
        Kind::Other(_) => {}
    }

    Ok(snapshot)
}

fn status_of<T: DeserializeOwned + Default>(kind: &Kind, object: &serde_json::Value) -> Result<T> {
    match object.get("status") {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(status) => serde_json::from_value(status.clone()).map_err(|e| KubeError::Decode {
            kind: kind.to_string(),
            message: e.to_string(),
        }),
    }
}
