//! kd Core - resource model for the kd deployment tool
//!
//! This crate provides the foundational types used throughout kd:
//! - `ManagedResource`: one rendered document to be deployed
//! - `Kind`: the workload category driving readiness rules
//! - `StatusSnapshot`: status fields observed by a single poll
//! - `documents`: multi-document splitting and manifest file discovery

pub mod documents;
pub mod error;
pub mod resource;
pub mod status;

pub use documents::{discover_manifest_files, is_empty_document, split_documents};
pub use error::{CoreError, Result};
pub use resource::{CreateOnlyRef, Kind, ManagedResource, ObjectMeta, ResourceSpec, ROLLING_UPDATE};
pub use status::StatusSnapshot;
