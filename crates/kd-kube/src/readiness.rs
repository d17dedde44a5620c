//! Rollout readiness rules
//!
//! A pure function of the kind, the desired spec and the latest snapshot:
//! - Deployment: nothing unavailable, all replicas available and updated
//! - StatefulSet: all desired replicas ready and both revisions equal
//! - DaemonSet: every scheduled pod available and updated
//! - Job: exactly one successful completion
//!
//! Deployments, StatefulSets and DaemonSets additionally need a status the
//! controller has written for the current spec. A fresh object reports all
//! zeroes, which would otherwise satisfy the Deployment rule before the
//! controller has looked at it.

use kd_core::{Kind, ResourceSpec, StatusSnapshot};

/// Verdict for a single snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub available: i32,
    pub unavailable: i32,
}

impl Readiness {
    fn new(ready: bool, available: i32, unavailable: i32) -> Self {
        Self {
            ready,
            available,
            unavailable,
        }
    }
}

/// Evaluate whether `status` shows a converged rollout of `kind` with `spec`
pub fn evaluate(kind: &Kind, spec: &ResourceSpec, status: &StatusSnapshot) -> Readiness {
    match kind {
        Kind::Deployment => {
            let converged = status.unavailable_replicas == 0
                && status.available_replicas == status.replicas
                && status.replicas == status.updated_replicas;

            Readiness::new(
                converged && status.is_observed(),
                status.available_replicas,
                status.unavailable_replicas,
            )
        }
        Kind::StatefulSet => {
            let desired = spec.desired_replicas();
            let converged = status.ready_replicas == desired
                && status.current_revision == status.update_revision;

            Readiness::new(
                converged && status.is_observed(),
                status.ready_replicas,
                desired - status.ready_replicas,
            )
        }
        Kind::DaemonSet => {
            let converged = status.desired_number_scheduled == status.number_available
                && status.updated_number_scheduled == status.desired_number_scheduled;

            Readiness::new(
                converged && status.is_observed(),
                status.number_available,
                status.desired_number_scheduled - status.updated_number_scheduled,
            )
        }
        Kind::Job => {
            let succeeded = status.succeeded == 1;
            if succeeded {
                Readiness::new(true, 1, 0)
            } else {
                Readiness::new(false, 0, 1)
            }
        }
        Kind::Other(_) => Readiness::new(true, 0, 0),
    }
}
