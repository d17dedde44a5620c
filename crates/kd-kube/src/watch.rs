//! Rollout watching
//!
//! After submission a workload is polled on a fixed interval until the
//! readiness rules pass. A one-shot deadline is raced against both the poll
//! ticker and every status fetch, so a stuck fetch cannot outlive it.

use std::time::Duration;

use kd_core::ManagedResource;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::ClusterClient;
use crate::error::{KubeError, Result};
use crate::readiness::evaluate;

/// Timing and policy of a watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Time between polls
    pub interval: Duration,

    /// Deadline for the rollout, counted from the first poll
    pub timeout: Duration,

    /// Pause before the first poll so the controller can publish status
    pub initial_delay: Duration,

    /// Fetch attempts per poll before giving up
    pub fetch_attempts: u32,

    /// Sleep between failed fetch attempts
    pub retry_delay: Duration,

    /// Fail when the object's generation moves while watching
    pub fail_on_superseded: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(180),
            initial_delay: Duration::from_secs(3),
            fetch_attempts: 3,
            retry_delay: Duration::from_secs(2),
            fail_on_superseded: false,
        }
    }
}

/// States a watch moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Initial,
    Polling,
    Ready,
    TimedOut,
    Superseded,
    FetchFailed,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchState::Initial | WatchState::Polling)
    }
}

/// Successful end of a watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOutcome {
    /// Available count at completion; `None` when the rollout was not polled
    pub available: Option<i32>,

    /// Number of successful status fetches
    pub polls: u32,
}

/// Per-resource bookkeeping, dropped when the watch ends
struct WatchSession<'a> {
    kind: &'a str,
    name: &'a str,
    state: WatchState,
    baseline: Option<i64>,
    polls: u32,
}

impl<'a> WatchSession<'a> {
    fn transition(&mut self, next: WatchState) {
        tracing::debug!(kind = self.kind, name = self.name, from = ?self.state, to = ?next, "watch state");
        self.state = next;
    }

    /// Record the generation of a poll; true when it moved past the baseline
    fn generation_moved(&mut self, generation: Option<i64>) -> bool {
        match (self.baseline, generation) {
            (None, current) => {
                self.baseline = current;
                false
            }
            (Some(baseline), Some(current)) => baseline != current,
            (Some(_), None) => false,
        }
    }
}

/// Poll `resource` until its rollout converges
///
/// StatefulSets and DaemonSets without a `RollingUpdate` strategy finish
/// immediately without a fetch. Each fetch replaces `resource.status`.
pub async fn watch(
    client: &dyn ClusterClient,
    resource: &mut ManagedResource,
    config: &WatchConfig,
) -> Result<WatchOutcome> {
    if resource.kind.has_update_strategy() && !resource.spec.is_rolling_update() {
        tracing::info!(
            kind = %resource.kind,
            name = resource.name(),
            strategy = resource.spec.update_strategy.as_deref().unwrap_or_default(),
            "update strategy is not RollingUpdate, not waiting for rollout"
        );
        return Ok(WatchOutcome {
            available: None,
            polls: 0,
        });
    }

    if resource.name().is_empty() {
        return Err(KubeError::MissingName {
            kind: resource.kind.to_string(),
            generate_name: resource.generate_name().unwrap_or_default().to_string(),
            action: "watch".to_string(),
        });
    }

    let kind = resource.kind.to_string();
    let name = resource.name().to_string();
    let mut session = WatchSession {
        kind: &kind,
        name: &name,
        state: WatchState::Initial,
        baseline: None,
        polls: 0,
    };

    resource.status = Default::default();
    tokio::time::sleep(config.initial_delay).await;
    session.transition(WatchState::Polling);

    let deadline = tokio::time::sleep_until(Instant::now() + config.timeout);
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => break,
            _ = ticker.tick() => {}
        }

        // a hung kubectl is dropped (and killed) when the deadline fires
        let fetched = tokio::select! {
            biased;
            _ = &mut deadline => break,
            fetched = fetch_with_retry(client, &kind, &name, config) => fetched,
        };
        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                session.transition(WatchState::FetchFailed);
                return Err(e);
            }
        };
        session.polls += 1;
        let generation = snapshot.generation.or(snapshot.observed_generation);
        resource.status = snapshot;

        let verdict = evaluate(&resource.kind, &resource.spec, &resource.status);
        if verdict.ready {
            session.transition(WatchState::Ready);
            tracing::info!(
                kind = %kind,
                name = %name,
                available = verdict.available,
                "rollout complete"
            );
            return Ok(WatchOutcome {
                available: Some(verdict.available),
                polls: session.polls,
            });
        }

        if session.generation_moved(generation) && config.fail_on_superseded {
            session.transition(WatchState::Superseded);
            return Err(KubeError::Superseded { kind, name });
        }

        tracing::info!(
            kind = %kind,
            name = %name,
            unavailable = verdict.unavailable,
            "waiting for rollout"
        );
    }

    session.transition(WatchState::TimedOut);
    Err(KubeError::WatchTimeout {
        kind,
        name,
        timeout: humantime::format_duration(config.timeout).to_string(),
    })
}

async fn fetch_with_retry(
    client: &dyn ClusterClient,
    kind: &str,
    name: &str,
    config: &WatchConfig,
) -> Result<kd_core::StatusSnapshot> {
    let attempts = config.fetch_attempts.max(1);
    let mut attempt = 1;

    loop {
        match client.fetch_snapshot(kind, name).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if attempt >= attempts => {
                return Err(KubeError::FetchFailed {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    attempts,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                tracing::warn!(kind, name, attempt, error = %e, "failed to fetch status, retrying");
                attempt += 1;
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterClient;
    use kd_core::StatusSnapshot;

    fn resource(manifest: &str) -> ManagedResource {
        ManagedResource::from_manifest(manifest, "test.yaml").unwrap()
    }

    fn deployment() -> ManagedResource {
        resource("kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 3\n")
    }

    fn deployment_status(generation: i64, available: i32) -> StatusSnapshot {
        StatusSnapshot {
            generation: Some(generation),
            observed_generation: Some(generation),
            replicas: 3,
            updated_replicas: 3,
            available_replicas: available,
            unavailable_replicas: 3 - available,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deployment_becomes_ready() {
        let client = MockClusterClient::new();
        client.push_snapshot(deployment_status(1, 1));
        client.push_snapshot(deployment_status(1, 2));
        client.push_snapshot(deployment_status(1, 3));

        let mut web = deployment();
        let outcome = watch(&client, &mut web, &WatchConfig::default()).await.unwrap();

        assert_eq!(outcome.available, Some(3));
        assert_eq!(outcome.polls, 3);
        assert_eq!(web.status, deployment_status(1, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rolling_statefulset_is_not_polled() {
        let client = MockClusterClient::new();
        let mut db = resource(
            "kind: StatefulSet\nmetadata:\n  name: db\nspec:\n  updateStrategy:\n    type: OnDelete\n",
        );

        let outcome = watch(&client, &mut db, &WatchConfig::default()).await.unwrap();

        assert_eq!(outcome.available, None);
        assert_eq!(client.fetch_snapshot_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersession_compares_with_first_generation() {
        let client = MockClusterClient::new();
        client.push_snapshot(deployment_status(2, 1));
        client.push_snapshot(deployment_status(2, 2));
        client.push_snapshot(deployment_status(3, 2));

        let config = WatchConfig {
            fail_on_superseded: true,
            ..Default::default()
        };
        let mut web = deployment();
        let err = watch(&client, &mut web, &config).await.unwrap_err();

        assert!(matches!(err, KubeError::Superseded { .. }));
        assert_eq!(client.fetch_snapshot_count(), 3);
        assert!(err.to_string().contains("superseded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_change_tolerated_by_default() {
        let client = MockClusterClient::new();
        client.push_snapshot(deployment_status(2, 1));
        client.push_snapshot(deployment_status(3, 2));
        client.push_snapshot(deployment_status(3, 3));

        let mut web = deployment();
        let outcome = watch(&client, &mut web, &WatchConfig::default()).await.unwrap();

        assert_eq!(outcome.polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_exhaustion_reports_last_error() {
        let client = MockClusterClient::new();
        client.push_snapshot(deployment_status(1, 1));
        client.push_snapshot_error("connection refused");

        let mut web = deployment();
        let err = watch(&client, &mut web, &WatchConfig::default()).await.unwrap_err();

        match err {
            KubeError::FetchFailed { attempts, source, .. } => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // one good poll, then three failed attempts
        assert_eq!(client.fetch_snapshot_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fetch_failure_is_retried() {
        let client = MockClusterClient::new();
        client.push_snapshot_error("i/o timeout");
        client.push_snapshot(deployment_status(1, 3));

        let mut web = deployment();
        let outcome = watch(&client, &mut web, &WatchConfig::default()).await.unwrap();

        assert_eq!(outcome.polls, 1);
        assert_eq!(client.fetch_snapshot_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_names_resource_and_duration() {
        let client = MockClusterClient::new();
        client.push_snapshot(deployment_status(1, 0));

        let config = WatchConfig {
            timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let mut web = deployment();
        let err = watch(&client, &mut web, &config).await.unwrap_err();

        assert!(matches!(err, KubeError::WatchTimeout { .. }));
        assert_eq!(err.to_string(), "Deployment rolling update \"web\" timed out after 30s");
    }

    /// Client whose status fetch never answers
    struct StuckClient;

    #[async_trait::async_trait]
    impl ClusterClient for StuckClient {
        async fn fetch_field(&self, _kind: &str, _name: &str, _path: &str) -> Result<String> {
            std::future::pending().await
        }

        async fn fetch_snapshot(&self, _kind: &str, _name: &str) -> Result<StatusSnapshot> {
            std::future::pending().await
        }

        async fn submit(&self, _verb: crate::client::Verb, _manifest: &str) -> Result<crate::client::SubmitOutput> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_stuck_fetch() {
        let config = WatchConfig {
            timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let started = Instant::now();
        let mut web = deployment();
        let err = watch(&StuckClient, &mut web, &config).await.unwrap_err();

        assert!(matches!(err, KubeError::WatchTimeout { .. }));
        // initial delay plus the deadline, not the hour a stuck kubectl could take
        let elapsed = started.elapsed();
        assert!(elapsed >= config.initial_delay + config.timeout);
        assert!(elapsed < config.initial_delay + config.timeout + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_ready_on_first_poll() {
        let client = MockClusterClient::new();
        client.push_snapshot(StatusSnapshot {
            succeeded: 1,
            ..Default::default()
        });

        let mut job = resource("kind: Job\nmetadata:\n  name: migrate-x7k2p\n");
        let outcome = watch(&client, &mut job, &WatchConfig::default()).await.unwrap();

        assert_eq!(outcome, WatchOutcome { available: Some(1), polls: 1 });
        assert_eq!(client.fetch_snapshot_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unnamed_resource_cannot_be_watched() {
        let client = MockClusterClient::new();
        let mut job = resource("kind: Job\nmetadata:\n  generateName: migrate-\n");

        let err = watch(&client, &mut job, &WatchConfig::default()).await.unwrap_err();
        assert!(matches!(err, KubeError::MissingName { .. }));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!WatchState::Polling.is_terminal());
        assert!(WatchState::Ready.is_terminal());
        assert!(WatchState::TimedOut.is_terminal());
    }
}
