//! Deploy command - render, parse and deploy every manifest document

use std::path::Path;
use std::sync::Arc;

use console::style;
use kd_core::{ManagedResource, discover_manifest_files, is_empty_document, split_documents};
use kd_engine::{Engine, Vars};
use kd_kube::{ClusterClient, ClusterLookup, DeployOutcome, Deployer, KubectlClient, NoopClient};
use tokio::runtime::Handle;

use crate::config::RunConfig;
use crate::error::{CliError, Result};

/// Run the deploy command
///
/// Every document is rendered and parsed before the first submission, so a
/// broken template never leaves a partial deployment behind.
pub async fn run(config: &RunConfig) -> Result<()> {
    if config.files.is_empty() {
        return Err(CliError::config_with_help(
            "no kubernetes resource files specified",
            "pass --file or set FILES",
        ));
    }

    let files = discover_manifest_files(&config.files)?;

    // Held until the run ends; drops the temporary CA/kubeconfig files
    let material = if config.dry_run {
        None
    } else {
        Some(config.connection.stage().await?)
    };

    let client: Arc<dyn ClusterClient> = match &material {
        None => Arc::new(NoopClient),
        Some(material) => Arc::new(
            KubectlClient::new(material.args().to_vec()).with_submit_args(config.kubectl_args.clone()),
        ),
    };

    let engine = Engine::builder()
        .strict(!config.allow_missing)
        .lookup(Arc::new(ClusterLookup::new(Arc::clone(&client), Handle::current())))
        .build();
    let vars = template_vars(config.env_file.as_deref())?;

    let mut resources = Vec::new();
    for file in &files {
        resources.extend(load_file(&engine, file, &vars, config)?);
    }

    if config.dry_run {
        for resource in &resources {
            tracing::info!(
                kind = %resource.kind,
                name = resource.display_name(),
                create_only = resource.create_only,
                "dry run, not deploying"
            );
        }
        return Ok(());
    }

    Deployer::new(client, config.deploy.clone())
        .deploy_all(&mut resources, report)
        .await?;

    Ok(())
}

/// The process environment, plus env file entries it does not already set
fn template_vars(env_file: Option<&Path>) -> Result<Vars> {
    let mut vars: Vars = std::env::vars().collect();

    if let Some(path) = env_file {
        let load_failed = |e: dotenvy::Error| {
            CliError::config_with_help("error loading env file", format!("{}: {}", path.display(), e))
        };
        for entry in dotenvy::from_path_iter(path).map_err(load_failed)? {
            let (key, value) = entry.map_err(load_failed)?;
            vars.entry(key).or_insert(value);
        }
    }

    Ok(vars)
}

/// Render and parse every document of a manifest file
fn load_file(engine: &Engine, file: &Path, vars: &Vars, config: &RunConfig) -> Result<Vec<ManagedResource>> {
    tracing::debug!(file = %file.display(), "parsing file");

    let source = std::fs::read_to_string(file)
        .map_err(|e| CliError::config(format!("failed to read {}: {}", file.display(), e)))?;
    let name = file.display().to_string();

    let mut resources = Vec::new();
    for document in split_documents(&source) {
        let rendered = engine.render_str(document, &name, vars)?;

        if config.debug_templates {
            tracing::info!(file = %name, "template:\n{}", rendered.text);
        }
        if is_empty_document(&rendered.text) {
            tracing::debug!(file = %name, "skipping empty document");
            continue;
        }

        let mut resource = ManagedResource::from_manifest(rendered.text, name.as_str())?;
        resource.create_only = rendered.secret_used;
        config.deploy.apply_create_only(&mut resource);
        resources.push(resource);
    }

    Ok(resources)
}

fn report(resource: &ManagedResource, outcome: &DeployOutcome) {
    let target = format!("{}/{}", resource.kind, resource.display_name());

    match outcome {
        DeployOutcome::Skipped(reason) => println!(
            "{} {} skipped ({:?})",
            style("-").yellow(),
            style(target).cyan(),
            reason
        ),
        DeployOutcome::Submitted { verb } => println!(
            "{} {} {}",
            style("✓").green().bold(),
            style(target).cyan(),
            verb
        ),
        DeployOutcome::Ready { verb, watch } => match watch.available {
            Some(available) => println!(
                "{} {} {}, {} available",
                style("✓").green().bold(),
                style(target).cyan(),
                verb,
                style(available).yellow()
            ),
            None => println!(
                "{} {} {}, rollout not watched",
                style("✓").green().bold(),
                style(target).cyan(),
                verb
            ),
        },
    }
}
