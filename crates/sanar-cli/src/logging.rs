//! Log subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

/// Install the global subscriber; logs go to stderr.
///
/// `RUST_LOG` wins over the verbosity flags. Installing twice is a no-op.
pub fn init(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false);

    let installed = if config.log_json {
        builder.json().try_init()
    } else {
        builder
            .with_ansi(config.color.should_color())
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("Log subscriber already installed");
    }
}
