//! Log output setup

use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a log filter, e.g. `KD_LOG=kd_kube=debug`
pub const LOG_ENV: &str = "KD_LOG";

/// Install the global subscriber, writing to stderr
///
/// `KD_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
pub fn init(debug: bool) {
    let default = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(debug),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(default.into())
                .with_env_var(LOG_ENV)
                .from_env_lossy(),
        )
        .init();
}
