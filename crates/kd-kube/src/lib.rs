//! kd Kube - Kubernetes integration for kd
//!
//! This crate provides:
//! - **Cluster Clients**: kubectl-backed, no-op (dry run) and mock implementations
//! - **Connection**: kubectl global flags and scoped CA/kubeconfig material
//! - **Existence Checks**: "not found" kept apart from real failures
//! - **Dispatch**: create/apply/replace/delete selection and submission
//! - **Readiness**: per-kind rollout completion rules
//! - **Watching**: deadline-bound polling until a rollout converges

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod existence;
pub mod lookup;
pub mod readiness;
pub mod watch;

pub use client::{ClusterClient, KubectlClient, MockCall, MockClusterClient, NoopClient, SubmitOutput, Verb};
pub use connection::{ClusterMaterial, ConnectionOptions};
pub use dispatch::{Decision, DeployOptions, DeployOutcome, Deployer, RunMode, SkipReason, choose_verb};
pub use error::{KubeError, Result};
pub use existence::resource_exists;
pub use lookup::ClusterLookup;
pub use readiness::{Readiness, evaluate};
pub use watch::{WatchConfig, WatchOutcome, WatchState, watch};
