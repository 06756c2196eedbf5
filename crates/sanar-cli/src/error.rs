//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// No record under the requested logical name
    #[error("No locator named '{name}' in {store}")]
    UnknownLocator {
        /// Requested logical name
        name: String,
        /// Store directory searched
        store: String,
    },

    /// Output could not be rendered
    #[error("Failed to render output: {message}")]
    Render {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sanar library error
    #[error("Sanar error: {0}")]
    Sanar(#[from] sanar::SanarError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a render error
    #[must_use]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::render(e.to_string())
    }
}

impl From<serde_yaml_ng::Error> for CliError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::render(e.to_string())
    }
}
