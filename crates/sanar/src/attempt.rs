//! Diagnostic record of each descriptor tried during a resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::generator::Heuristic;
use crate::locator::LocatorDescriptor;

/// Where a tried descriptor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "heuristic", rename_all = "snake_case")]
pub enum CandidateSource {
    /// The descriptor the caller asked for
    Primary,
    /// The record's fallback history
    Stored,
    /// The candidate generator
    Heuristic(Heuristic),
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Stored => f.write_str("stored"),
            Self::Heuristic(h) => write!(f, "heuristic:{h}"),
        }
    }
}

/// What happened when a descriptor was tried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// No live element matched
    NoMatch,
    /// Exactly one live element matched
    Unique,
    /// Several matched and the verifier picked one
    Verified {
        /// Score of the chosen element
        score: f64,
    },
    /// Several matched and none could be picked
    Ambiguous {
        /// Candidate scores, best first
        scores: Vec<f64>,
    },
    /// The provider failed on this query
    ProviderError {
        /// Provider message
        message: String,
    },
    /// The query exceeded the per-query timeout
    TimedOut,
}

impl AttemptOutcome {
    /// Whether this attempt produced the resolved element
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Unique | Self::Verified { .. })
    }
}

/// One descriptor tried during a resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAttempt {
    /// 0 for the primary, then 1, 2, ... in trial order
    pub rank: usize,
    /// Descriptor tried
    pub descriptor: LocatorDescriptor,
    /// Origin of the descriptor
    pub source: CandidateSource,
    /// Result of the query
    pub outcome: AttemptOutcome,
}

impl CandidateAttempt {
    /// Confidence attached to a success at this rank: `1 / (1 + rank)`
    #[must_use]
    pub fn confidence(&self) -> f64 {
        confidence_for_rank(self.rank)
    }
}

/// Confidence for a match found at `rank`; strictly decreasing, 1.0 at rank 0.
#[must_use]
pub fn confidence_for_rank(rank: usize) -> f64 {
    1.0 / (1.0 + rank as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_strictly_decreases() {
        let values: Vec<f64> = (0..10).map(confidence_for_rank).collect();
        assert!((values[0] - 1.0).abs() < f64::EPSILON);
        assert!(values.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_success_outcomes() {
        assert!(AttemptOutcome::Unique.is_success());
        assert!(AttemptOutcome::Verified { score: 0.8 }.is_success());
        assert!(!AttemptOutcome::NoMatch.is_success());
        assert!(!AttemptOutcome::TimedOut.is_success());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(CandidateSource::Stored.to_string(), "stored");
        assert_eq!(
            CandidateSource::Heuristic(Heuristic::VisibleText).to_string(),
            "heuristic:visible_text"
        );
    }
}
