//! Cluster connection settings
//!
//! Turns namespace, context, credentials and CA material into kubectl
//! global flags. CA data, downloaded CAs and inline kubeconfigs are written
//! to files; those without an explicit destination live in a temporary
//! directory owned by [`ClusterMaterial`] and removed when it is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use url::Url;

use crate::error::{KubeError, Result};

const CA_FILE_NAME: &str = "kube-ca.pem";
const KUBECONFIG_FILE_NAME: &str = "kube-config";

/// How to reach and authenticate against the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,

    /// Path or http(s) URL of the CA certificate
    pub certificate_authority: Option<String>,

    /// PEM encoded CA certificate
    pub certificate_authority_data: Option<String>,

    /// Where CA data or a downloaded CA is saved
    pub certificate_authority_file: Option<PathBuf>,

    pub insecure_skip_tls_verify: bool,

    /// Complete kubeconfig document
    pub kube_config_data: Option<String>,
}

/// kubectl global flags plus the files they point at
#[derive(Debug)]
pub struct ClusterMaterial {
    _dir: Option<TempDir>,
    args: Vec<String>,
}

impl ClusterMaterial {
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl ConnectionOptions {
    /// Write any CA or kubeconfig material and build the kubectl flags
    pub async fn stage(&self) -> Result<ClusterMaterial> {
        let mut dir: Option<TempDir> = None;
        let mut args = Vec::new();

        if let Some(config) = non_empty(&self.kube_config_data) {
            let path = scratch_path(&mut dir, KUBECONFIG_FILE_NAME)?;
            tokio::fs::write(&path, config).await?;
            args.push(format!("--kubeconfig={}", path.display()));
        }
        if let Some(server) = non_empty(&self.server) {
            args.push(format!("--server={server}"));
        }
        if self.insecure_skip_tls_verify {
            args.push("--insecure-skip-tls-verify".to_string());
        }
        if let Some(data) = non_empty(&self.certificate_authority_data) {
            let path = self.ca_destination(&mut dir)?;
            if !path.exists() {
                tokio::fs::write(&path, data).await?;
            }
            args.push(format!("--certificate-authority={}", path.display()));
        }
        if let Some(ca) = non_empty(&self.certificate_authority) {
            let path = self.resolve_ca(ca, &mut dir).await?;
            args.push(format!("--certificate-authority={}", path.display()));
        }
        match non_empty(&self.token) {
            Some(token) => args.push(format!("--token={token}")),
            None => {
                if let Some(username) = non_empty(&self.username) {
                    args.push(format!("--username={username}"));
                }
                if let Some(password) = non_empty(&self.password) {
                    args.push(format!("--password={password}"));
                }
            }
        }
        if let Some(context) = non_empty(&self.context) {
            args.push(format!("--context={context}"));
        }
        if let Some(namespace) = non_empty(&self.namespace) {
            args.push(format!("--namespace={namespace}"));
        }

        Ok(ClusterMaterial { _dir: dir, args })
    }

    fn ca_destination(&self, dir: &mut Option<TempDir>) -> Result<PathBuf> {
        match &self.certificate_authority_file {
            Some(path) => Ok(path.clone()),
            None => scratch_path(dir, CA_FILE_NAME),
        }
    }

    /// A plain path is used as is; a URL is downloaded once
    async fn resolve_ca(&self, ca: &str, dir: &mut Option<TempDir>) -> Result<PathBuf> {
        let url = match Url::parse(ca) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => return Ok(PathBuf::from(ca)),
        };

        let path = self.ca_destination(dir)?;
        if path.exists() {
            tracing::debug!(path = %path.display(), %url, "ca file already exists, skipping download");
            return Ok(path);
        }

        tracing::debug!(path = %path.display(), %url, "downloading ca");
        download(&url, &path).await?;
        Ok(path)
    }
}

async fn download(url: &Url, path: &Path) -> Result<()> {
    let failed = |message: String| KubeError::CaDownload {
        url: url.to_string(),
        message,
    };

    let response = reqwest::get(url.clone())
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| failed(e.to_string()))?;
    let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    tokio::fs::write(path, &body).await?;
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn scratch_path(dir: &mut Option<TempDir>, file_name: &str) -> Result<PathBuf> {
    let scratch = match dir.take() {
        Some(scratch) => scratch,
        None => tempfile::Builder::new().prefix("kd-").tempdir()?,
    };
    let path = scratch.path().join(file_name);
    *dir = Some(scratch);
    Ok(path)
}
