//! The unit of deployable work: one rendered manifest document

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::status::StatusSnapshot;

/// Update strategy type watched to completion for StatefulSets and DaemonSets
pub const ROLLING_UPDATE: &str = "RollingUpdate";

/// Workload category of a resource
///
/// Only the four workload kinds carry status that kd knows how to
/// evaluate; everything else is submitted and left alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    Other(String),
}

impl Kind {
    /// The kind as written in manifests and accepted by kubectl
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Deployment => "Deployment",
            Kind::StatefulSet => "StatefulSet",
            Kind::DaemonSet => "DaemonSet",
            Kind::Job => "Job",
            Kind::Other(kind) => kind,
        }
    }

    /// Whether kd polls this kind for readiness after submission
    pub fn is_watchable(&self) -> bool {
        !matches!(self, Kind::Other(_))
    }

    /// Whether the update strategy decides if the rollout is watched
    pub fn has_update_strategy(&self) -> bool {
        matches!(self, Kind::StatefulSet | Kind::DaemonSet)
    }
}

impl From<&str> for Kind {
    fn from(kind: &str) -> Self {
        match kind {
            "Deployment" => Kind::Deployment,
            "StatefulSet" => Kind::StatefulSet,
            "DaemonSet" => Kind::DaemonSet,
            "Job" => Kind::Job,
            other => Kind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity metadata of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    /// Prefix the API server extends with a random suffix on create
    #[serde(default)]
    pub generate_name: String,
}

/// Desired-state fields needed to judge readiness
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSpec {
    /// `spec.replicas`, absent when the manifest relies on the API default
    pub replicas: Option<i32>,

    /// `spec.updateStrategy.type`
    pub update_strategy: Option<String>,
}

impl ResourceSpec {
    /// Desired replica count, defaulting to one like the API server does
    pub fn desired_replicas(&self) -> i32 {
        self.replicas.unwrap_or(1)
    }

    /// An absent strategy is defaulted to `RollingUpdate` by the API server
    pub fn is_rolling_update(&self) -> bool {
        self.update_strategy
            .as_deref()
            .is_none_or(|strategy| strategy == ROLLING_UPDATE)
    }

    fn from_yaml(spec: Option<&serde_yaml::Value>) -> Self {
        let Some(spec) = spec else {
            return Self::default();
        };

        let replicas = spec
            .get("replicas")
            .and_then(|r| r.as_i64())
            .and_then(|r| i32::try_from(r).ok());
        let update_strategy = spec
            .get("updateStrategy")
            .and_then(|s| s.get("type"))
            .and_then(|t| t.as_str())
            .map(String::from);

        Self {
            replicas,
            update_strategy,
        }
    }
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    kind: String,

    #[serde(default)]
    metadata: ObjectMeta,

    #[serde(default)]
    spec: Option<serde_yaml::Value>,
}

/// A rendered manifest plus everything kd tracks while deploying it
#[derive(Debug, Clone)]
pub struct ManagedResource {
    pub kind: Kind,
    pub metadata: ObjectMeta,
    pub spec: ResourceSpec,

    /// Latest observed status, replaced wholesale on every fetch
    pub status: StatusSnapshot,

    /// Leave the object untouched when it already exists
    pub create_only: bool,

    /// Rendered document submitted to the cluster
    pub manifest: String,

    /// File the document was rendered from
    pub source_file: String,
}

impl ManagedResource {
    /// Parse a rendered manifest document
    pub fn from_manifest(manifest: impl Into<String>, source_file: impl Into<String>) -> Result<Self> {
        let manifest = manifest.into();
        let source_file = source_file.into();

        let raw: RawDocument =
            serde_yaml::from_str(&manifest).map_err(|error| CoreError::ManifestParse {
                file: source_file.clone(),
                error,
            })?;

        if raw.kind.is_empty() {
            return Err(CoreError::MissingKind { file: source_file });
        }

        Ok(Self {
            kind: Kind::from(raw.kind.as_str()),
            metadata: raw.metadata,
            spec: ResourceSpec::from_yaml(raw.spec.as_ref()),
            status: StatusSnapshot::default(),
            create_only: false,
            manifest,
            source_file,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn generate_name(&self) -> Option<&str> {
        Some(self.metadata.generate_name.as_str()).filter(|g| !g.is_empty())
    }

    /// Name to show in logs: the real name, or the generate-name prefix
    pub fn display_name(&self) -> &str {
        match (self.name(), self.generate_name()) {
            ("", Some(prefix)) => prefix,
            (name, _) => name,
        }
    }

    /// `kind/name` reference understood by kubectl
    pub fn reference(&self) -> String {
        format!("{}/{}", self.kind, self.name())
    }
}

/// A `kind/name` pair selecting a single resource as create-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOnlyRef {
    pub kind: String,
    pub name: String,
}

impl CreateOnlyRef {
    /// Case-insensitive match on kind and name
    pub fn matches(&self, resource: &ManagedResource) -> bool {
        resource.kind.as_str().eq_ignore_ascii_case(&self.kind)
            && resource.name().eq_ignore_ascii_case(&self.name)
    }
}

impl FromStr for CreateOnlyRef {
    type Err = CoreError;

    fn from_str(reference: &str) -> Result<Self> {
        match reference.split('/').collect::<Vec<_>>().as_slice() {
            [kind, name] if !kind.is_empty() && !name.is_empty() => Ok(Self {
                kind: kind.to_string(),
                name: name.to_string(),
            }),
            _ => Err(CoreError::InvalidResourceRef {
                reference: reference.to_string(),
            }),
        }
    }
}

impl fmt::Display for CreateOnlyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}
