//! Command line flags and the run configuration built from them

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use kd_core::CreateOnlyRef;
use kd_kube::{ConnectionOptions, DeployOptions, RunMode, WatchConfig};

use crate::error::{CliError, Result};

/// Flags shared by every kd invocation
///
/// Each flag can also come from the environment; `PLUGIN_`-prefixed
/// variants of the names are honoured as well.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Debug output
    #[arg(long, env = "DEBUG", global = true)]
    pub debug: bool,

    /// Log every rendered manifest
    #[arg(long, env = "DEBUG_TEMPLATES", global = true)]
    pub debug_templates: bool,

    /// Render and parse everything but deploy nothing
    #[arg(long = "dryrun", visible_alias = "dry-run", env = "DRY_RUN", global = true)]
    pub dry_run: bool,

    /// Delete the resources instead of applying them
    #[arg(long, conflicts_with = "replace", global = true)]
    pub delete: bool,

    /// Use replace instead of apply for existing objects
    #[arg(long, env = "KUBE_REPLACE", global = true)]
    pub replace: bool,

    /// Do not check the server's certificate for validity
    #[arg(long, env = "INSECURE_SKIP_TLS_VERIFY", global = true)]
    pub insecure_skip_tls_verify: bool,

    /// Kubernetes config file data
    #[arg(long, env = "KUBE_CONFIG_DATA", global = true, hide_env_values = true)]
    pub kube_config_data: Option<String>,

    /// Kubernetes API server URL
    #[arg(short = 's', long, env = "KUBE_SERVER", value_name = "URL", global = true)]
    pub kube_server: Option<String>,

    /// Kubernetes auth token
    #[arg(short = 't', long, env = "KUBE_TOKEN", value_name = "TOKEN", global = true, hide_env_values = true)]
    pub kube_token: Option<String>,

    /// Kubernetes auth username
    #[arg(short = 'u', long, env = "KUBE_USERNAME", value_name = "USERNAME", global = true)]
    pub kube_username: Option<String>,

    /// Kubernetes auth password
    #[arg(short = 'p', long, env = "KUBE_PASSWORD", value_name = "PASSWORD", global = true, hide_env_values = true)]
    pub kube_password: Option<String>,

    /// Only create resources, skipping any that exist
    #[arg(long, env = "CREATE_ONLY", global = true)]
    pub create_only: bool,

    /// Only create the given resources, e.g. 'secret/db' (skip if exists)
    #[arg(
        long = "create-only-resource",
        env = "CREATE_ONLY_RESOURCES",
        value_name = "KIND/NAME",
        value_delimiter = ',',
        global = true
    )]
    pub create_only_resources: Vec<String>,

    /// Kubeconfig context
    #[arg(short = 'c', long, env = "KUBE_CONTEXT", value_name = "CONTEXT", global = true)]
    pub context: Option<String>,

    /// Kubernetes namespace
    #[arg(short = 'n', long, env = "KUBE_NAMESPACE", value_name = "NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Fail if the rollout is superseded by another one
    #[arg(long, env = "FAIL_SUPERSEDED", global = true)]
    pub fail_superseded: bool,

    /// Path or URL of the CA certificate for the Kubernetes API
    #[arg(long, env = "KUBE_CERTIFICATE_AUTHORITY", value_name = "PATH", global = true)]
    pub certificate_authority: Option<String>,

    /// PEM encoded CA certificate for the Kubernetes API
    #[arg(long, env = "KUBE_CERTIFICATE_AUTHORITY_DATA", global = true, hide_env_values = true)]
    pub certificate_authority_data: Option<String>,

    /// Where to save CA data or a downloaded CA (default: a temporary file)
    #[arg(long, env = "KUBE_CERTIFICATE_AUTHORITY_FILE", value_name = "PATH", global = true)]
    pub certificate_authority_file: Option<PathBuf>,

    /// File or directory containing Kubernetes resources
    #[arg(short = 'f', long = "file", env = "FILES", value_name = "PATH", value_delimiter = ',', global = true)]
    pub files: Vec<PathBuf>,

    /// How long to wait for a rollout to complete
    #[arg(
        short = 'T',
        long,
        env = "TIMEOUT",
        default_value = "3m",
        value_parser = humantime::parse_duration,
        global = true
    )]
    pub timeout: Duration,

    /// Time between rollout status checks
    #[arg(
        long,
        env = "CHECK_INTERVAL",
        default_value = "1s",
        value_parser = humantime::parse_duration,
        global = true
    )]
    pub check_interval: Duration,

    /// Render missing template variables as empty instead of failing
    #[arg(long, env = "ALLOW_MISSING", global = true)]
    pub allow_missing: bool,

    /// Env file whose variables are added to the template context
    #[arg(long = "config", env = "CONFIG_FILE", value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,
}

/// Everything a run needs, fixed before any work starts
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub files: Vec<PathBuf>,
    pub dry_run: bool,
    pub debug_templates: bool,
    pub allow_missing: bool,

    /// Env file loaded under the process environment
    pub env_file: Option<PathBuf>,
    pub deploy: DeployOptions,
    pub connection: ConnectionOptions,

    /// Extra kubectl flags for submissions
    pub kubectl_args: Vec<String>,
}

impl RunConfig {
    pub fn from_args(args: &GlobalArgs, kubectl_args: Vec<String>) -> Result<Self> {
        if args.check_interval.is_zero() {
            return Err(CliError::config("--check-interval must be greater than zero"));
        }

        let create_only_resources = args
            .create_only_resources
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| {
                r.parse::<CreateOnlyRef>().map_err(|e| {
                    CliError::config_with_help(e.to_string(), "use the form kind/name, e.g. secret/db")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mode = if args.delete {
            RunMode::Delete
        } else if args.replace {
            RunMode::Replace
        } else {
            RunMode::Apply
        };

        let deploy = DeployOptions {
            mode,
            create_only: args.create_only,
            create_only_resources,
            watch: WatchConfig {
                interval: args.check_interval,
                timeout: args.timeout,
                fail_on_superseded: args.fail_superseded,
                ..Default::default()
            },
        };

        let connection = ConnectionOptions {
            namespace: args.namespace.clone(),
            context: args.context.clone(),
            token: args.kube_token.clone(),
            username: args.kube_username.clone(),
            password: args.kube_password.clone(),
            server: args.kube_server.clone(),
            certificate_authority: args.certificate_authority.clone(),
            certificate_authority_data: args.certificate_authority_data.clone(),
            certificate_authority_file: args.certificate_authority_file.clone(),
            insecure_skip_tls_verify: args.insecure_skip_tls_verify,
            kube_config_data: args.kube_config_data.clone(),
        };

        Ok(Self {
            files: args.files.clone(),
            dry_run: args.dry_run,
            debug_templates: args.debug_templates,
            allow_missing: args.allow_missing,
            env_file: args.env_file.clone(),
            deploy,
            connection,
            kubectl_args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: GlobalArgs,
    }

    fn config(argv: &[&str]) -> Result<RunConfig> {
        let cli = TestCli::try_parse_from(std::iter::once("kd").chain(argv.iter().copied())).unwrap();
        RunConfig::from_args(&cli.args, Vec::new())
    }

    #[test]
    fn test_defaults() {
        let config = config(&["-f", "deploy.yaml"]).unwrap();

        assert_eq!(config.files, vec![PathBuf::from("deploy.yaml")]);
        assert_eq!(config.deploy.mode, RunMode::Apply);
        assert_eq!(config.deploy.watch.timeout, Duration::from_secs(180));
        assert_eq!(config.deploy.watch.interval, Duration::from_secs(1));
        assert!(!config.deploy.watch.fail_on_superseded);
    }

    #[test]
    fn test_modes_and_durations() {
        let config = config(&[
            "--replace",
            "--timeout",
            "90s",
            "--check-interval",
            "500ms",
            "--fail-superseded",
        ])
        .unwrap();

        assert_eq!(config.deploy.mode, RunMode::Replace);
        assert_eq!(config.deploy.watch.timeout, Duration::from_secs(90));
        assert_eq!(config.deploy.watch.interval, Duration::from_millis(500));
        assert!(config.deploy.watch.fail_on_superseded);
    }

    #[test]
    fn test_delete_conflicts_with_replace() {
        assert!(TestCli::try_parse_from(["kd", "--delete", "--replace"]).is_err());
    }

    #[test]
    fn test_create_only_resources() {
        let config = config(&["--create-only-resource", "secret/db,configmap/settings"]).unwrap();

        assert_eq!(config.deploy.create_only_resources.len(), 2);
        assert_eq!(config.deploy.create_only_resources[0].to_string(), "secret/db");
    }

    #[test]
    fn test_invalid_create_only_resource() {
        let err = config(&["--create-only-resource", "secret"]).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_connection_flags() {
        let config = config(&["-n", "apps", "-c", "prod", "--kube-token", "t0k3n"]).unwrap();

        assert_eq!(config.connection.namespace.as_deref(), Some("apps"));
        assert_eq!(config.connection.context.as_deref(), Some("prod"));
        assert_eq!(config.connection.token.as_deref(), Some("t0k3n"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(config(&["--check-interval", "0s"]).is_err());
    }
}
