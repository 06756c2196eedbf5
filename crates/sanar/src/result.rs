//! Result and error types for Sanar.

use thiserror::Error;

use crate::attempt::CandidateAttempt;
use crate::locator::LocatorDescriptor;

/// Result type for Sanar operations
pub type SanarResult<T> = Result<T, SanarError>;

/// Errors that can occur in Sanar
#[derive(Debug, Error)]
pub enum SanarError {
    /// No live element matched the primary descriptor or any candidate
    #[error("No element found for {descriptor} after {} attempt(s)", attempts.len())]
    NotFound {
        /// Descriptor the caller asked for
        descriptor: LocatorDescriptor,
        /// Every attempt made, in order
        attempts: Vec<CandidateAttempt>,
    },

    /// Multiple elements matched and verification could not pick one
    #[error("Ambiguous match for {descriptor}: best scores {scores:?}")]
    AmbiguousMatch {
        /// Descriptor the caller asked for
        descriptor: LocatorDescriptor,
        /// Every attempt made, in order
        attempts: Vec<CandidateAttempt>,
        /// Scores of the last ambiguous candidate set, best first
        scores: Vec<f64>,
    },

    /// The per-resolution budget ran out, or every query timed out without an answer
    #[error("Resolution of {descriptor} timed out after {budget_ms}ms ({attempted} attempt(s))")]
    Timeout {
        /// Descriptor the caller asked for
        descriptor: LocatorDescriptor,
        /// Configured budget in milliseconds
        budget_ms: u64,
        /// Number of attempts started
        attempted: usize,
        /// Attempts that completed
        attempts: Vec<CandidateAttempt>,
    },

    /// The enclosing test cancelled the resolution
    #[error("Resolution of {descriptor} cancelled after {attempted} attempt(s)")]
    Cancelled {
        /// Descriptor the caller asked for
        descriptor: LocatorDescriptor,
        /// Number of attempts started before cancellation
        attempted: usize,
    },

    /// Locator store read or write failed
    #[error("Persistence error: {message}")]
    Persistence {
        /// Error message
        message: String,
    },

    /// Page provider failed to answer a query
    #[error("Page provider error: {message}")]
    Provider {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Descriptor text could not be parsed
    #[error("Invalid descriptor '{input}': {message}")]
    InvalidDescriptor {
        /// The rejected input
        input: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SanarError {
    /// Create a persistence error
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a provider error
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error ends a resolution (as opposed to an ambient failure)
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AmbiguousMatch { .. }
                | Self::Timeout { .. }
                | Self::Cancelled { .. }
        )
    }

    /// Attempts recorded before the error, if the variant carries them
    #[must_use]
    pub fn attempts(&self) -> &[CandidateAttempt] {
        match self {
            Self::NotFound { attempts, .. }
            | Self::AmbiguousMatch { attempts, .. }
            | Self::Timeout { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Strategy;

    #[test]
    fn test_not_found_message_counts_attempts() {
        let err = SanarError::NotFound {
            descriptor: LocatorDescriptor::new(Strategy::Css, "#login-btn"),
            attempts: vec![],
        };
        assert_eq!(
            err.to_string(),
            "No element found for css:#login-btn after 0 attempt(s)"
        );
        assert!(err.is_terminal());
    }

    #[test]
    fn test_persistence_is_not_terminal() {
        let err = SanarError::persistence("disk full");
        assert!(!err.is_terminal());
        assert!(err.attempts().is_empty());
        assert_eq!(err.to_string(), "Persistence error: disk full");
    }

    #[test]
    fn test_timeout_message() {
        let err = SanarError::Timeout {
            descriptor: LocatorDescriptor::new(Strategy::Id, "email"),
            budget_ms: 250,
            attempted: 3,
            attempts: vec![],
        };
        assert!(err.to_string().contains("250ms"));
        assert!(err.to_string().contains("3 attempt(s)"));
    }
}
