//! In-process resolver counters and timers.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How a resolution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Primary descriptor matched uniquely
    PrimaryHit,
    /// A fallback or generated candidate matched
    Healed,
    /// Nothing matched
    NotFound,
    /// Matches could not be disambiguated
    Ambiguous,
    /// Budget ran out
    TimedOut,
    /// Caller cancelled
    Cancelled,
}

/// Lock-free counters shared by every resolution on a resolver
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    resolutions: AtomicU64,
    primary_hits: AtomicU64,
    heals: AtomicU64,
    not_found: AtomicU64,
    ambiguous: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
    attempts: AtomicU64,
    provider_errors: AtomicU64,
    persistence_errors: AtomicU64,
    total_micros: AtomicU64,
}

impl ResolverMetrics {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished resolution and its wall time
    pub fn record_resolution(&self, outcome: ResolutionOutcome, elapsed: Duration) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        let counter = match outcome {
            ResolutionOutcome::PrimaryHit => &self.primary_hits,
            ResolutionOutcome::Healed => &self.heals,
            ResolutionOutcome::NotFound => &self.not_found,
            ResolutionOutcome::Ambiguous => &self.ambiguous,
            ResolutionOutcome::TimedOut => &self.timeouts,
            ResolutionOutcome::Cancelled => &self.cancellations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one provider query
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a provider failure
    pub fn record_provider_error(&self) {
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a store or journal failure
    pub fn record_persistence_error(&self) {
        self.persistence_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            resolutions: load(&self.resolutions),
            primary_hits: load(&self.primary_hits),
            heals: load(&self.heals),
            not_found: load(&self.not_found),
            ambiguous: load(&self.ambiguous),
            timeouts: load(&self.timeouts),
            cancellations: load(&self.cancellations),
            attempts: load(&self.attempts),
            provider_errors: load(&self.provider_errors),
            persistence_errors: load(&self.persistence_errors),
            total_resolution_ms: load(&self.total_micros) as f64 / 1000.0,
        }
    }
}

/// Serializable copy of [`ResolverMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Finished resolutions
    pub resolutions: u64,
    /// Resolved by the primary descriptor
    pub primary_hits: u64,
    /// Resolved by healing
    pub heals: u64,
    /// Ended with nothing found
    pub not_found: u64,
    /// Ended ambiguous
    pub ambiguous: u64,
    /// Ended by budget exhaustion or an unresponsive page
    pub timeouts: u64,
    /// Ended by cancellation
    pub cancellations: u64,
    /// Provider queries issued
    pub attempts: u64,
    /// Provider queries that failed
    pub provider_errors: u64,
    /// Store or journal writes that failed
    pub persistence_errors: u64,
    /// Total wall time spent resolving
    pub total_resolution_ms: f64,
}

impl MetricsSnapshot {
    /// Fraction of resolutions that needed healing
    #[must_use]
    pub fn heal_rate(&self) -> f64 {
        if self.resolutions == 0 {
            0.0
        } else {
            self.heals as f64 / self.resolutions as f64
        }
    }

    /// Mean wall time per resolution
    #[must_use]
    pub fn average_resolution_ms(&self) -> f64 {
        if self.resolutions == 0 {
            0.0
        } else {
            self.total_resolution_ms / self.resolutions as f64
        }
    }
}
