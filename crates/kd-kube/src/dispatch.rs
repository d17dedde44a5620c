//! Deploy dispatch
//!
//! Chooses one verb per resource, submits the manifest and, for workloads,
//! watches the rollout to a terminal outcome before returning.

use std::sync::Arc;

use kd_core::{CreateOnlyRef, ManagedResource};

use crate::client::{ClusterClient, SubmitOutput, Verb};
use crate::error::{KubeError, Result};
use crate::existence::resource_exists;
use crate::watch::{WatchConfig, WatchOutcome, watch};

/// What a run does with each resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Create or update in place
    #[default]
    Apply,
    /// Replace existing objects, create missing ones
    Replace,
    /// Delete existing objects
    Delete,
}

/// Options shared by every resource of a run
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub mode: RunMode,

    /// Treat every resource as create-only
    pub create_only: bool,

    /// Individual resources to treat as create-only
    pub create_only_resources: Vec<CreateOnlyRef>,

    pub watch: WatchConfig,
}

impl DeployOptions {
    /// Mark `resource` create-only when the run options select it
    pub fn apply_create_only(&self, resource: &mut ManagedResource) {
        if self.create_only || self.create_only_resources.iter().any(|r| r.matches(resource)) {
            resource.create_only = true;
        }
    }
}

/// Why a resource was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Create-only and already present
    CreateOnlyExists,
    /// Delete requested for an absent object
    DeleteAbsent,
}

/// Dispatch decision for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip(SkipReason),
    Submit(Verb),
}

/// Pick the verb for a resource
///
/// Precedence: delete mode, then create-only skip, then generated names
/// (which can only be created), then replace mode, then apply.
pub fn choose_verb(mode: RunMode, create_only: bool, generate_name: bool, exists: bool) -> Decision {
    if mode == RunMode::Delete {
        return if exists {
            Decision::Submit(Verb::Delete)
        } else {
            Decision::Skip(SkipReason::DeleteAbsent)
        };
    }
    if create_only && exists {
        return Decision::Skip(SkipReason::CreateOnlyExists);
    }
    if generate_name {
        return Decision::Submit(Verb::Create);
    }
    match mode {
        RunMode::Replace if exists => Decision::Submit(Verb::Replace),
        RunMode::Replace => Decision::Submit(Verb::Create),
        _ => Decision::Submit(Verb::Apply),
    }
}

/// Result of deploying one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    Skipped(SkipReason),
    /// Submitted; the kind is not watched or the run is deleting
    Submitted { verb: Verb },
    /// Submitted and watched to completion
    Ready { verb: Verb, watch: WatchOutcome },
}

/// Submits resources one at a time through a cluster client
pub struct Deployer {
    client: Arc<dyn ClusterClient>,
    options: DeployOptions,
}

impl Deployer {
    pub fn new(client: Arc<dyn ClusterClient>, options: DeployOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Deploy a single resource to a terminal outcome
    pub async fn deploy(&self, resource: &mut ManagedResource) -> Result<DeployOutcome> {
        // generateName always means create, even when a name is also given
        let generate_name = resource.generate_name().is_some();

        if self.options.mode == RunMode::Delete && generate_name && resource.name().is_empty() {
            return Err(KubeError::MissingName {
                kind: resource.kind.to_string(),
                generate_name: resource.generate_name().unwrap_or_default().to_string(),
                action: "delete".to_string(),
            });
        }

        let needs_existence = resource.create_only || self.options.mode != RunMode::Apply;
        let exists = if needs_existence {
            resource_exists(self.client.as_ref(), resource.kind.as_str(), resource.name())
                .await
                .map_err(|e| KubeError::ExistenceCheck {
                    resource: resource.reference(),
                    source: Box::new(e),
                })?
        } else {
            false
        };

        let verb = match choose_verb(self.options.mode, resource.create_only, generate_name, exists) {
            Decision::Skip(reason) => {
                tracing::info!(
                    kind = %resource.kind,
                    name = resource.name(),
                    ?reason,
                    "skipping resource"
                );
                return Ok(DeployOutcome::Skipped(reason));
            }
            Decision::Submit(verb) => verb,
        };

        tracing::info!(
            kind = %resource.kind,
            name = resource.display_name(),
            %verb,
            "{} resource",
            verb.action()
        );

        let output = self.client.submit(verb, &resource.manifest).await?;
        check_submission(verb, resource, &output)?;
        if !output.stdout.trim().is_empty() {
            tracing::debug!(stdout = output.stdout.trim(), "kubectl output");
        }

        if generate_name {
            let name = generated_name(&output.stdout).ok_or_else(|| KubeError::GeneratedName {
                output: output.stdout.clone(),
            })?;
            tracing::info!(kind = %resource.kind, name = %name, "created with generated name");
            resource.metadata.name = name;
        }

        if verb == Verb::Delete || !resource.kind.is_watchable() {
            return Ok(DeployOutcome::Submitted { verb });
        }

        let watch = watch(self.client.as_ref(), resource, &self.options.watch).await?;
        Ok(DeployOutcome::Ready { verb, watch })
    }

    /// Deploy resources in order, stopping at the first failure
    ///
    /// `on_outcome` sees each resource as soon as it finishes. Resources
    /// submitted before the failure stay deployed.
    pub async fn deploy_all<F>(&self, resources: &mut [ManagedResource], mut on_outcome: F) -> Result<Vec<DeployOutcome>>
    where
        F: FnMut(&ManagedResource, &DeployOutcome),
    {
        let mut outcomes = Vec::with_capacity(resources.len());
        for resource in resources.iter_mut() {
            let outcome = self.deploy(resource).await?;
            on_outcome(resource, &outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

fn check_submission(verb: Verb, resource: &ManagedResource, output: &SubmitOutput) -> Result<()> {
    let Some(exit_error) = &output.exit_error else {
        return Ok(());
    };

    let stderr = output.stderr.trim();
    let message = if stderr.is_empty() {
        exit_error.clone()
    } else {
        stderr.to_string()
    };

    Err(KubeError::Submission {
        verb: verb.to_string(),
        resource: format!("{}/{}", resource.kind, resource.display_name()),
        message,
    })
}

/// Name from a `kind/name created` confirmation line
fn generated_name(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let created = line.trim().strip_suffix(" created")?;
        let name = created.rsplit('/').next()?.trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterClient;
    use crate::client::GENERATED_SUFFIX;
    use kd_core::StatusSnapshot;

    fn resource(manifest: &str) -> ManagedResource {
        ManagedResource::from_manifest(manifest, "test.yaml").unwrap()
    }

    fn config_map() -> ManagedResource {
        resource("kind: ConfigMap\nmetadata:\n  name: settings\n")
    }

    fn deployer(client: &MockClusterClient, options: DeployOptions) -> Deployer {
        Deployer::new(Arc::new(client.clone()), options)
    }

    #[test]
    fn test_choose_verb_table() {
        use Decision::*;
        use RunMode::*;

        assert_eq!(choose_verb(Delete, false, false, true), Submit(Verb::Delete));
        assert_eq!(choose_verb(Delete, true, false, false), Skip(SkipReason::DeleteAbsent));
        assert_eq!(choose_verb(Apply, true, false, true), Skip(SkipReason::CreateOnlyExists));
        assert_eq!(choose_verb(Apply, true, false, false), Submit(Verb::Apply));
        assert_eq!(choose_verb(Replace, false, false, true), Submit(Verb::Replace));
        assert_eq!(choose_verb(Replace, false, false, false), Submit(Verb::Create));
        assert_eq!(choose_verb(Replace, false, true, false), Submit(Verb::Create));
        assert_eq!(choose_verb(Apply, false, true, false), Submit(Verb::Create));
        assert_eq!(choose_verb(Apply, false, false, false), Submit(Verb::Apply));
    }

    #[test]
    fn test_generated_name_parsing() {
        assert_eq!(
            generated_name("job.batch/migrate-x7k2p created\n"),
            Some("migrate-x7k2p".to_string())
        );
        assert_eq!(generated_name("Warning: something\npod/p-abc created"), Some("p-abc".to_string()));
        assert_eq!(generated_name("job.batch/migrate configured"), None);
    }

    #[test]
    fn test_create_only_selection() {
        let options = DeployOptions {
            create_only_resources: vec!["configmap/SETTINGS".parse().unwrap()],
            ..Default::default()
        };

        let mut settings = config_map();
        options.apply_create_only(&mut settings);
        assert!(settings.create_only);

        let mut other = resource("kind: ConfigMap\nmetadata:\n  name: other\n");
        options.apply_create_only(&mut other);
        assert!(!other.create_only);
    }

    #[tokio::test]
    async fn test_apply_skips_existence_check() {
        let client = MockClusterClient::new();
        let mut settings = config_map();

        let outcome = deployer(&client, DeployOptions::default())
            .deploy(&mut settings)
            .await
            .unwrap();

        assert_eq!(outcome, DeployOutcome::Submitted { verb: Verb::Apply });
        assert_eq!(client.fetch_field_count(), 0);
    }

    #[tokio::test]
    async fn test_create_only_existing_is_skipped() {
        let client = MockClusterClient::new().with_existing("ConfigMap", "settings");
        let mut settings = config_map();
        settings.create_only = true;

        let outcome = deployer(&client, DeployOptions::default())
            .deploy(&mut settings)
            .await
            .unwrap();

        assert_eq!(outcome, DeployOutcome::Skipped(SkipReason::CreateOnlyExists));
        assert!(client.submitted_verbs().is_empty());
    }

    #[tokio::test]
    async fn test_replace_mode() {
        let client = MockClusterClient::new().with_existing("ConfigMap", "settings");
        let options = DeployOptions {
            mode: RunMode::Replace,
            ..Default::default()
        };
        let d = deployer(&client, options);

        d.deploy(&mut config_map()).await.unwrap();
        d.deploy(&mut resource("kind: ConfigMap\nmetadata:\n  name: fresh\n"))
            .await
            .unwrap();

        assert_eq!(client.submitted_verbs(), vec![Verb::Replace, Verb::Create]);
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let client = MockClusterClient::new();
        let options = DeployOptions {
            mode: RunMode::Delete,
            ..Default::default()
        };

        let outcome = deployer(&client, options).deploy(&mut config_map()).await.unwrap();

        assert_eq!(outcome, DeployOutcome::Skipped(SkipReason::DeleteAbsent));
        assert!(client.submitted_verbs().is_empty());
    }

    #[tokio::test]
    async fn test_delete_does_not_watch() {
        let client = MockClusterClient::new().with_existing("Deployment", "web");
        let options = DeployOptions {
            mode: RunMode::Delete,
            ..Default::default()
        };
        let mut web = resource("kind: Deployment\nmetadata:\n  name: web\n");

        let outcome = deployer(&client, options).deploy(&mut web).await.unwrap();

        assert_eq!(outcome, DeployOutcome::Submitted { verb: Verb::Delete });
        assert_eq!(client.fetch_snapshot_count(), 0);
        assert!(!client.exists("Deployment", "web"));
    }

    #[tokio::test]
    async fn test_delete_generate_name_is_error() {
        let client = MockClusterClient::new();
        let options = DeployOptions {
            mode: RunMode::Delete,
            ..Default::default()
        };
        let mut job = resource("kind: Job\nmetadata:\n  generateName: migrate-\n");

        let err = deployer(&client, options).deploy(&mut job).await.unwrap_err();
        assert!(matches!(err, KubeError::MissingName { .. }));
    }

    #[tokio::test]
    async fn test_existence_failure_aborts() {
        let client = MockClusterClient::new().with_field_error("ConfigMap", "settings", "Forbidden");
        let mut settings = config_map();
        settings.create_only = true;

        let err = deployer(&client, DeployOptions::default())
            .deploy(&mut settings)
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::ExistenceCheck { .. }));
        assert!(client.submitted_verbs().is_empty());
    }

    #[tokio::test]
    async fn test_submission_error_prefers_stderr() {
        let client = MockClusterClient::new();
        client.push_submission(SubmitOutput::failure(
            "error: the server doesn't have a resource type \"Widget\"\n",
            "exit status: 1",
        ));

        let err = deployer(&client, DeployOptions::default())
            .deploy(&mut config_map())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to apply ConfigMap/settings: error: the server doesn't have a resource type \"Widget\""
        );
    }

    #[tokio::test]
    async fn test_submission_error_without_stderr() {
        let client = MockClusterClient::new();
        client.push_submission(SubmitOutput::failure("", "exit status: 1"));

        let err = deployer(&client, DeployOptions::default())
            .deploy(&mut config_map())
            .await
            .unwrap_err();

        assert!(err.to_string().ends_with("exit status: 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_job_is_named_then_watched() {
        let client = MockClusterClient::new();
        client.push_snapshot(StatusSnapshot {
            succeeded: 1,
            ..Default::default()
        });
        let mut job = resource("kind: Job\nmetadata:\n  generateName: migrate-\n");

        let outcome = deployer(&client, DeployOptions::default())
            .deploy(&mut job)
            .await
            .unwrap();

        let expected = format!("migrate-{GENERATED_SUFFIX}");
        assert_eq!(job.name(), expected);
        assert_eq!(client.submitted_verbs(), vec![Verb::Create]);
        assert!(matches!(outcome, DeployOutcome::Ready { verb: Verb::Create, .. }));
        assert!(client.calls().iter().any(|c| matches!(
            c,
            crate::client::MockCall::FetchSnapshot { name, .. } if *name == expected
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_all_stops_at_first_failure() {
        let client = MockClusterClient::new();
        client.push_submission(SubmitOutput::success("configmap/settings configured\n"));
        client.push_submission(SubmitOutput::failure("denied", "exit status: 1"));

        let mut resources = vec![
            config_map(),
            resource("kind: Secret\nmetadata:\n  name: creds\n"),
            resource("kind: Service\nmetadata:\n  name: web\n"),
        ];

        let mut reported = Vec::new();
        let err = deployer(&client, DeployOptions::default())
            .deploy_all(&mut resources, |resource, outcome| {
                reported.push((resource.reference(), *outcome));
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Secret/creds"));
        assert_eq!(client.submitted_verbs().len(), 2);
        assert_eq!(
            reported,
            vec![("ConfigMap/settings".to_string(), DeployOutcome::Submitted { verb: Verb::Apply })]
        );
    }

    #[tokio::test]
    async fn test_deploy_all_reports_every_outcome() {
        let client = MockClusterClient::new().with_existing("Secret", "creds");
        let mut creds = resource("kind: Secret\nmetadata:\n  name: creds\n");
        creds.create_only = true;
        let mut resources = vec![creds, config_map()];

        let mut reported = 0;
        let outcomes = deployer(&client, DeployOptions::default())
            .deploy_all(&mut resources, |_, _| reported += 1)
            .await
            .unwrap();

        assert_eq!(reported, 2);
        assert_eq!(
            outcomes,
            vec![
                DeployOutcome::Skipped(SkipReason::CreateOnlyExists),
                DeployOutcome::Submitted { verb: Verb::Apply },
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_name_with_name_is_created() {
        let client = MockClusterClient::new();
        let mut settings = resource(
            "kind: ConfigMap\nmetadata:\n  name: settings\n  generateName: settings-\n",
        );

        let outcome = deployer(&client, DeployOptions::default())
            .deploy(&mut settings)
            .await
            .unwrap();

        assert_eq!(outcome, DeployOutcome::Submitted { verb: Verb::Create });
        assert_eq!(settings.name(), "settings");
    }

    #[tokio::test]
    async fn test_delete_named_resource_with_generate_name() {
        let client = MockClusterClient::new().with_existing("ConfigMap", "settings");
        let options = DeployOptions {
            mode: RunMode::Delete,
            ..Default::default()
        };
        let mut settings = resource(
            "kind: ConfigMap\nmetadata:\n  name: settings\n  generateName: settings-\n",
        );

        let outcome = deployer(&client, options).deploy(&mut settings).await.unwrap();

        assert_eq!(outcome, DeployOutcome::Submitted { verb: Verb::Delete });
    }
}
