//! kubectl-backed cluster client

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use kd_core::{Kind, StatusSnapshot};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ClusterClient, SubmitOutput, Verb, decode_snapshot};
use crate::error::{KubeError, Result};

const DEFAULT_BINARY: &str = "kubectl";

/// Runs the kubectl binary for every cluster operation
///
/// `global_args` (context, namespace, credentials) go on every invocation;
/// `submit_args` only on submissions.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    binary: String,
    global_args: Vec<String>,
    submit_args: Vec<String>,
}

impl KubectlClient {
    pub fn new(global_args: Vec<String>) -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            global_args,
            submit_args: Vec::new(),
        }
    }

    /// Use a different kubectl binary
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Extra flags for apply/create/replace/delete, e.g. `--record`
    pub fn with_submit_args(mut self, args: Vec<String>) -> Self {
        self.submit_args = args;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.global_args);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Arguments of a submission; create has no `--force`
    fn submit_args(&self, verb: Verb) -> Vec<String> {
        let mut args = vec![verb.as_str().to_string(), "-f".to_string(), "-".to_string()];
        args.extend(
            self.submit_args
                .iter()
                .filter(|arg| !(verb == Verb::Create && arg.as_str() == "--force"))
                .cloned(),
        );
        args
    }

    async fn get(&self, args: &[String]) -> Result<String> {
        tracing::debug!(binary = %self.binary, ?args, "running kubectl");

        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(KubeError::ProcessStart)?;

        if !output.status.success() {
            return Err(KubeError::Command {
                command: args.join(" "),
                message: failure_message(&output.stderr, output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run kubectl with inherited stdio, for `kd run`
    pub async fn passthrough(&self, args: &[String]) -> Result<()> {
        tracing::debug!(binary = %self.binary, ?args, "running kubectl passthrough");

        let status = self
            .command()
            .args(args)
            .status()
            .await
            .map_err(KubeError::ProcessStart)?;

        if !status.success() {
            return Err(KubeError::Command {
                command: args.join(" "),
                message: status.to_string(),
            });
        }
        Ok(())
    }
}

fn failure_message(stderr: &[u8], status: ExitStatus) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status.to_string()
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl ClusterClient for KubectlClient {
    async fn fetch_field(&self, kind: &str, name: &str, path: &str) -> Result<String> {
        let args = vec![
            "get".to_string(),
            format!("{kind}/{name}"),
            "-o".to_string(),
            format!("custom-columns=:{path}"),
            "--no-headers".to_string(),
        ];
        let out = self.get(&args).await?;
        Ok(out.trim().to_string())
    }

    async fn fetch_snapshot(&self, kind: &str, name: &str) -> Result<StatusSnapshot> {
        let args = vec![
            "get".to_string(),
            format!("{kind}/{name}"),
            "-o".to_string(),
            "json".to_string(),
        ];
        let out = self.get(&args).await?;

        let object: serde_json::Value = serde_json::from_str(&out).map_err(|e| KubeError::Decode {
            kind: kind.to_string(),
            message: e.to_string(),
        })?;

        decode_snapshot(&Kind::from(kind), &object)
    }

    async fn submit(&self, verb: Verb, manifest: &str) -> Result<SubmitOutput> {
        let args = self.submit_args(verb);
        tracing::debug!(binary = %self.binary, ?args, "submitting manifest");

        let mut child = self
            .command()
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(KubeError::ProcessStart)?;

        // Feed stdin concurrently so a large manifest cannot deadlock on full pipes
        let writer = child.stdin.take().map(|mut stdin| {
            let manifest = manifest.to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(manifest.as_bytes()).await {
                    tracing::debug!(error = %e, "kubectl closed stdin early");
                }
            })
        });

        let output = child.wait_with_output().await?;
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        Ok(SubmitOutput {
            stdout,
            stderr,
            exit_error: (!output.status.success()).then(|| output.status.to_string()),
        })
    }
}
