//! Sanar CLI Library
//!
//! Read-only diagnostics over a Sanar locator store and heal journal.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, ConfigCommand, HealsArgs, HistoryArgs, ListArgs,
    OutputFormat, StoreArgs, DEFAULT_HEAL_LOG, DEFAULT_STORE_DIR,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{Painter, Reporter};
