//! Config command handler

use sanar::{HealingConfig, SanarError};

use crate::commands::{ConfigArgs, ConfigCommand};
use crate::error::{CliError, CliResult};
use crate::output::Reporter;

/// Execute the config command
pub fn execute_config(args: &ConfigArgs, out: &Reporter) -> CliResult<()> {
    match &args.command {
        ConfigCommand::Check { path, show } => {
            let config = HealingConfig::from_path(path).map_err(|e| match e {
                SanarError::Config { message } => {
                    CliError::config(format!("{}: {message}", path.display()))
                }
                other => CliError::config(format!("{}: {other}", path.display())),
            })?;
            out.success(&format!("{} is valid", path.display()));
            if *show {
                out.print(&serde_yaml_ng::to_string(&config)?);
            }
            Ok(())
        }
        ConfigCommand::Defaults => {
            out.print(&render_defaults()?);
            Ok(())
        }
    }
}

/// Default configuration as YAML
pub fn render_defaults() -> CliResult<String> {
    Ok(serde_yaml_ng::to_string(&HealingConfig::default())?)
}
