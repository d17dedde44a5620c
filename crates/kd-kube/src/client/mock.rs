//! Mock cluster client for testing
//!
//! Answers from in-memory state and records every call, so dispatch and
//! watch logic can be exercised without a cluster.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kd_core::{ManagedResource, StatusSnapshot};

use super::{ClusterClient, SubmitOutput, Verb};
use crate::error::{KubeError, Result};

/// Suffix the mock appends to a generateName prefix on create
pub const GENERATED_SUFFIX: &str = "x7k2p";

/// A call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    FetchField { kind: String, name: String, path: String },
    FetchSnapshot { kind: String, name: String },
    Submit { verb: Verb, manifest: String },
}

#[derive(Default)]
struct MockState {
    /// `Kind/name` references present in the cluster
    existing: HashSet<String>,
    /// reference -> error text returned by field fetches
    field_errors: HashMap<String, String>,
    /// (reference, path) -> value
    fields: HashMap<(String, String), String>,
    /// Scripted snapshot results; the last one repeats
    snapshots: VecDeque<std::result::Result<StatusSnapshot, String>>,
    /// Scripted submission results, used in order
    submissions: VecDeque<SubmitOutput>,
    calls: Vec<MockCall>,
}

/// In-memory cluster client for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `kind/name` as present
    pub fn with_existing(self, kind: &str, name: &str) -> Self {
        self.state.lock().unwrap().existing.insert(reference(kind, name));
        self
    }

    /// Make every field fetch of `kind/name` fail with `message`
    pub fn with_field_error(self, kind: &str, name: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .field_errors
            .insert(reference(kind, name), message.to_string());
        self
    }

    /// Answer a field lookup with a fixed value
    pub fn with_field(self, kind: &str, name: &str, path: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fields
            .insert((reference(kind, name), path.to_string()), value.to_string());
        self
    }

    /// Queue a snapshot for the next status fetch
    pub fn push_snapshot(&self, snapshot: StatusSnapshot) {
        self.state.lock().unwrap().snapshots.push_back(Ok(snapshot));
    }

    /// Queue a failed status fetch
    pub fn push_snapshot_error(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .push_back(Err(message.to_string()));
    }

    /// Queue the result of the next submission
    pub fn push_submission(&self, output: SubmitOutput) {
        self.state.lock().unwrap().submissions.push_back(output);
    }

    pub fn exists(&self, kind: &str, name: &str) -> bool {
        self.state.lock().unwrap().existing.contains(&reference(kind, name))
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fetch_field_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::FetchField { .. }))
    }

    pub fn fetch_snapshot_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::FetchSnapshot { .. }))
    }

    /// Verbs of all submissions, in order
    pub fn submitted_verbs(&self) -> Vec<Verb> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Submit { verb, .. } => Some(verb),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: MockCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn reference(kind: &str, name: &str) -> String {
    format!("{kind}/{name}")
}

fn not_found(kind: &str, name: &str) -> KubeError {
    KubeError::Command {
        command: format!("get {kind}/{name}"),
        message: format!("Error from server (NotFound): {kind} \"{name}\" not found"),
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn fetch_field(&self, kind: &str, name: &str, path: &str) -> Result<String> {
        self.record(MockCall::FetchField {
            kind: kind.to_string(),
            name: name.to_string(),
            path: path.to_string(),
        });

        let state = self.state.lock().unwrap();
        let key = reference(kind, name);

        if let Some(message) = state.field_errors.get(&key) {
            return Err(KubeError::Command {
                command: format!("get {key}"),
                message: message.clone(),
            });
        }
        if let Some(value) = state.fields.get(&(key.clone(), path.to_string())) {
            return Ok(value.clone());
        }
        if state.existing.contains(&key) && path == ".metadata.name" {
            return Ok(name.to_string());
        }
        Err(not_found(kind, name))
    }

    async fn fetch_snapshot(&self, kind: &str, name: &str) -> Result<StatusSnapshot> {
        self.record(MockCall::FetchSnapshot {
            kind: kind.to_string(),
            name: name.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        let next = if state.snapshots.len() > 1 {
            state.snapshots.pop_front()
        } else {
            state.snapshots.front().cloned()
        };

        match next {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(message)) => Err(KubeError::Command {
                command: format!("get {kind}/{name}"),
                message,
            }),
            None => Err(not_found(kind, name)),
        }
    }

    async fn submit(&self, verb: Verb, manifest: &str) -> Result<SubmitOutput> {
        self.record(MockCall::Submit {
            verb,
            manifest: manifest.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        if let Some(output) = state.submissions.pop_front() {
            return Ok(output);
        }

        let Ok(resource) = ManagedResource::from_manifest(manifest, "mock") else {
            return Ok(SubmitOutput::success(""));
        };

        let name = match (resource.name(), resource.generate_name()) {
            ("", Some(prefix)) => format!("{prefix}{GENERATED_SUFFIX}"),
            (name, _) => name.to_string(),
        };
        let key = reference(resource.kind.as_str(), &name);

        let word = match verb {
            Verb::Delete => {
                state.existing.remove(&key);
                "deleted"
            }
            Verb::Create => {
                state.existing.insert(key.clone());
                "created"
            }
            Verb::Replace => "replaced",
            Verb::Apply => {
                state.existing.insert(key.clone());
                "configured"
            }
        };

        Ok(SubmitOutput::success(format!(
            "{}/{} {}\n",
            resource.kind.as_str().to_lowercase(),
            name,
            word
        )))
    }
}
