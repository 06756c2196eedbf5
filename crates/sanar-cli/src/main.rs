//! Sanar CLI: inspect self-healing locator history
//!
//! ## Usage
//!
//! ```bash
//! sanar list                          # Every logical locator in the store
//! sanar history login-submit-button   # Primary, fallbacks and last snapshot
//! sanar heals --name login -l 10      # Recent heals from the journal
//! sanar config check sanar.yaml       # Validate a healing configuration
//! ```

use clap::Parser;
use sanar_cli::{
    handlers, logging, Cli, CliConfig, CliError, CliResult, Commands, Reporter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(&config);
    let out = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());

    if let Commands::Config(args) = &cli.command {
        return handlers::execute_config(args, &out);
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::config(format!("failed to start async runtime: {e}")))?;
    rt.block_on(async {
        match &cli.command {
            Commands::History(args) => handlers::execute_history(args, &out).await,
            Commands::List(args) => handlers::execute_list(args, &out).await,
            Commands::Heals(args) => handlers::execute_heals(args, &out).await,
            Commands::Config(args) => handlers::execute_config(args, &out),
        }
    })
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_json(cli.log_json)
}
