//! Status observed by a single poll of a workload

/// Status fields of a workload as returned by one fetch
///
/// A snapshot is built from scratch for every fetch and assigned over the
/// previous one. A field the cluster omitted stays at its default and
/// never inherits a value from an earlier poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// `metadata.generation` of the fetched object
    pub generation: Option<i64>,

    /// `status.observedGeneration`, bumped when the controller sees a new spec
    pub observed_generation: Option<i64>,

    // Deployment
    pub replicas: i32,
    pub updated_replicas: i32,
    pub available_replicas: i32,
    pub unavailable_replicas: i32,

    // StatefulSet
    pub ready_replicas: i32,
    pub current_revision: Option<String>,
    pub update_revision: Option<String>,

    // DaemonSet
    pub desired_number_scheduled: i32,
    pub updated_number_scheduled: i32,
    pub number_available: i32,

    // Job
    pub succeeded: i32,
}

impl StatusSnapshot {
    /// Whether the controller has reported status for the current spec
    pub fn is_observed(&self) -> bool {
        match (self.observed_generation, self.generation) {
            (None, _) => false,
            (Some(observed), Some(generation)) => observed >= generation,
            (Some(_), None) => true,
        }
    }
}
