//! Run command - kubectl with kd's connection flags

use kd_kube::{KubeError, KubectlClient, resource_exists};

use crate::config::RunConfig;
use crate::error::{CliError, Result};

/// Run kubectl, skipping it when the create-only resource already exists
pub async fn run(config: &RunConfig, args: &[String]) -> Result<()> {
    let create_only = &config.deploy.create_only_resources;
    if create_only.len() > 1 {
        return Err(CliError::config(
            "can only specify a single resource when using run",
        ));
    }

    let material = config.connection.stage().await?;
    let client = KubectlClient::new(material.args().to_vec());

    if let Some(reference) = create_only.first() {
        let exists = resource_exists(&client, &reference.kind, &reference.name)
            .await
            .map_err(|e| KubeError::ExistenceCheck {
                resource: reference.to_string(),
                source: Box::new(e),
            })?;

        if exists {
            tracing::info!(resource = %reference, "resource marked as create only, skipping run");
            return Ok(());
        }
    }

    client.passthrough(args).await?;
    Ok(())
}
