//! kd - simple Kubernetes resources deployment tool

use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod config;
mod error;
mod exit_codes;
mod logging;

use config::{GlobalArgs, RunConfig};
use error::Result;

/// Prefix of CI plugin environment variables mirrored onto kd's own names
const PLUGIN_ENV_PREFIX: &str = "PLUGIN_";

/// Plugin variables that do not follow `PLUGIN_<NAME>`, as (flag env, plugin env)
const PLUGIN_ENV_ALIASES: &[(&str, &str)] = &[("KUBE_CONTEXT", "PLUGIN_CONTEXT")];

#[derive(Parser)]
#[command(name = "kd")]
#[command(version)]
#[command(about = "Simple Kubernetes resources deployment tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: GlobalArgs,

    /// Extra flags passed to kubectl apply/create/replace/delete
    #[arg(last = true, value_name = "KUBECTL_FLAGS")]
    kubectl_args: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run kubectl with kd's connection flags and environment
    Run {
        /// Arguments for kubectl
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

fn main() {
    miette::set_panic_hook();
    apply_plugin_env();

    let cli = Cli::parse();
    logging::init(cli.args.debug);

    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };

    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let config = RunConfig::from_args(&cli.args, cli.kubectl_args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            None => commands::deploy::run(&config).await,
            Some(Commands::Run { args }) => commands::run::run(&config, &args).await,
        }
    })
}

/// Copy `PLUGIN_<NAME>` (or its alias) onto `<NAME>` for every flag variable not already set
fn apply_plugin_env() {
    let command = Cli::command();
    for arg in command.get_arguments() {
        let Some(name) = arg.get_env().and_then(|n| n.to_str()) else {
            continue;
        };
        if std::env::var_os(name).is_some() {
            continue;
        }
        let value = plugin_env_names(name)
            .into_iter()
            .find_map(std::env::var_os);
        if let Some(value) = value {
            // SAFETY: We're the only thread at this point (start of main)
            unsafe { std::env::set_var(name, value) };
        }
    }
}

/// Plugin variables that feed the flag variable `name`, in priority order
fn plugin_env_names(name: &str) -> Vec<String> {
    let mut names = vec![format!("{PLUGIN_ENV_PREFIX}{name}")];
    names.extend(
        PLUGIN_ENV_ALIASES
            .iter()
            .filter(|(env, _)| *env == name)
            .map(|(_, alias)| alias.to_string()),
    );
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_env_names() {
        assert_eq!(plugin_env_names("KUBE_TOKEN"), vec!["PLUGIN_KUBE_TOKEN"]);
        assert_eq!(
            plugin_env_names("KUBE_CONTEXT"),
            vec!["PLUGIN_KUBE_CONTEXT", "PLUGIN_CONTEXT"]
        );
    }

    #[test]
    fn test_aliases_name_real_flag_variables() {
        let command = Cli::command();
        let envs: Vec<_> = command
            .get_arguments()
            .filter_map(|arg| arg.get_env().and_then(|n| n.to_str()))
            .collect();

        for (env, _) in PLUGIN_ENV_ALIASES {
            assert!(envs.contains(env), "{env} is not a flag variable");
        }
    }
}
