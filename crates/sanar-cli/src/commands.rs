//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Default locator store directory
pub const DEFAULT_STORE_DIR: &str = ".sanar/locators";
/// Default heal journal path
pub const DEFAULT_HEAL_LOG: &str = ".sanar/heal.jsonl";

/// Sanar: inspect self-healing locator history and heal journals
#[derive(Parser, Debug)]
#[command(name = "sanar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolution history of one logical locator
    History(HistoryArgs),

    /// List every logical locator in the store
    List(ListArgs),

    /// Print the heal journal
    Heals(HealsArgs),

    /// Validate or print healing configuration
    Config(ConfigArgs),
}

/// Where the locator store lives
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Locator store directory
    #[arg(long, env = "SANAR_STORE", default_value = DEFAULT_STORE_DIR)]
    pub store: PathBuf,
}

/// Arguments for the history command
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Logical name of the locator
    pub name: String,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Only list locators that have healed at least once
    #[arg(long)]
    pub healed: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the heals command
#[derive(Parser, Debug)]
pub struct HealsArgs {
    /// Heal journal (JSON lines)
    #[arg(long, env = "SANAR_HEAL_LOG", default_value = DEFAULT_HEAL_LOG)]
    pub log: PathBuf,

    /// Only show heals of this logical locator
    #[arg(short, long)]
    pub name: Option<String>,

    /// Show at most this many heals, most recent last
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a YAML or JSON configuration file
    Check {
        /// Configuration file (.yaml, .yml or .json)
        path: PathBuf,

        /// Print the effective configuration after validation
        #[arg(long)]
        show: bool,
    },

    /// Print the default configuration as YAML
    Defaults,
}

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
