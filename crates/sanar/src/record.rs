//! Per-logical-name resolution history.
//!
//! One [`LocatorRecord`] exists per logical locator. Its fallback history is
//! kept unique by descriptor and sorted most-reliable-first: success count
//! descending, ties broken by the most recent success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::locator::LocatorDescriptor;
use crate::snapshot::AttributeSnapshot;

/// Success and failure counters for one descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStats {
    /// Time of the most recent success
    pub last_success: Option<DateTime<Utc>>,
    /// Total successes
    pub success_count: u64,
    /// Total failures
    pub failure_count: u64,
    /// Failures since the last success
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl AttemptStats {
    /// Count a success at `at`
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.success_count += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(at);
    }

    /// Count a failure
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Fraction of attempts that succeeded, 0.0 when never attempted
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }
}

/// A previously successful alternative descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEntry {
    /// The alternative descriptor
    pub descriptor: LocatorDescriptor,
    /// Its counters
    #[serde(flatten)]
    pub stats: AttemptStats,
}

impl FallbackEntry {
    fn new(descriptor: LocatorDescriptor) -> Self {
        Self {
            descriptor: descriptor.without_logical_name(),
            stats: AttemptStats::default(),
        }
    }

    /// Reliability ordering: higher success count first, then most recent
    /// success (never-succeeded last).
    fn reliability_cmp(&self, other: &Self) -> Ordering {
        other
            .stats
            .success_count
            .cmp(&self.stats.success_count)
            .then_with(|| other.stats.last_success.cmp(&self.stats.last_success))
    }
}

/// One resolution outcome to fold into a record
#[derive(Debug, Clone)]
pub struct AttemptUpdate {
    /// The descriptor the caller asked for
    pub primary: LocatorDescriptor,
    /// The descriptor that was tried
    pub descriptor: LocatorDescriptor,
    /// Whether it produced the chosen element
    pub success: bool,
    /// Snapshot of the chosen element (successes only)
    pub snapshot: Option<AttributeSnapshot>,
    /// When the attempt happened
    pub at: DateTime<Utc>,
}

impl AttemptUpdate {
    /// A successful attempt
    #[must_use]
    pub fn success(
        primary: &LocatorDescriptor,
        descriptor: &LocatorDescriptor,
        snapshot: AttributeSnapshot,
    ) -> Self {
        Self {
            primary: primary.without_logical_name(),
            descriptor: descriptor.without_logical_name(),
            success: true,
            snapshot: Some(snapshot),
            at: Utc::now(),
        }
    }

    /// A failed attempt
    #[must_use]
    pub fn failure(primary: &LocatorDescriptor, descriptor: &LocatorDescriptor) -> Self {
        Self {
            primary: primary.without_logical_name(),
            descriptor: descriptor.without_logical_name(),
            success: false,
            snapshot: None,
            at: Utc::now(),
        }
    }

    /// Override the timestamp
    #[must_use]
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    /// Whether the attempt was for the primary descriptor
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary == self.descriptor
    }
}

/// Resolution history for one logical locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorRecord {
    /// Store key
    pub logical_name: String,
    /// Descriptor the test code asks for
    pub primary_descriptor: LocatorDescriptor,
    /// Counters for the primary descriptor
    #[serde(default)]
    pub primary_stats: AttemptStats,
    /// Alternatives, most reliable first
    #[serde(default)]
    pub fallback_history: Vec<FallbackEntry>,
    /// Attributes of the last resolved element
    #[serde(default)]
    pub last_snapshot: AttributeSnapshot,
    /// Time of the last mutation
    pub updated_at: DateTime<Utc>,
}

impl LocatorRecord {
    /// Create a record from a first successful attempt.
    ///
    /// Returns `None` for failures: records only come into existence once
    /// something has resolved.
    #[must_use]
    pub fn from_first_success(logical_name: &str, update: &AttemptUpdate) -> Option<Self> {
        if !update.success {
            return None;
        }
        let mut record = Self {
            logical_name: logical_name.to_string(),
            primary_descriptor: update.primary.clone(),
            primary_stats: AttemptStats::default(),
            fallback_history: Vec::new(),
            last_snapshot: AttributeSnapshot::default(),
            updated_at: update.at,
        };
        record.apply(update);
        Some(record)
    }

    /// Fold one attempt into the record.
    ///
    /// Primary attempts only touch the primary counters. Fallback successes
    /// create or promote an entry; fallback failures only count against
    /// entries already in the history.
    pub fn apply(&mut self, update: &AttemptUpdate) {
        if update.primary != self.primary_descriptor {
            self.rebase_primary(&update.primary);
        }

        if update.is_primary() {
            if update.success {
                self.primary_stats.record_success(update.at);
            } else {
                self.primary_stats.record_failure();
            }
        } else if update.success {
            let position = self
                .fallback_history
                .iter()
                .position(|e| e.descriptor == update.descriptor);
            let index = position.unwrap_or_else(|| {
                self.fallback_history
                    .push(FallbackEntry::new(update.descriptor.clone()));
                self.fallback_history.len() - 1
            });
            self.fallback_history[index].stats.record_success(update.at);
            self.sort_history();
        } else if let Some(entry) = self
            .fallback_history
            .iter_mut()
            .find(|e| e.descriptor == update.descriptor)
        {
            entry.stats.record_failure();
            self.sort_history();
        }

        if let Some(snapshot) = update.snapshot.as_ref().filter(|s| !s.is_empty()) {
            if update.success {
                self.last_snapshot = snapshot.clone();
            }
        }
        self.updated_at = update.at;
    }

    /// Test code now asks for a different primary: the old primary becomes a
    /// fallback (keeping its counters) and the new one leaves the history.
    fn rebase_primary(&mut self, new_primary: &LocatorDescriptor) {
        let new_stats = self
            .fallback_history
            .iter()
            .position(|e| &e.descriptor == new_primary)
            .map(|i| self.fallback_history.remove(i).stats)
            .unwrap_or_default();

        let old = std::mem::replace(&mut self.primary_descriptor, new_primary.clone());
        let old_stats = std::mem::replace(&mut self.primary_stats, new_stats);
        if old_stats.success_count > 0 {
            self.fallback_history.push(FallbackEntry {
                descriptor: old,
                stats: old_stats,
            });
        }
        self.sort_history();
    }

    fn sort_history(&mut self) {
        self.fallback_history.sort_by(FallbackEntry::reliability_cmp);
    }

    /// Look up a fallback entry
    #[must_use]
    pub fn fallback(&self, descriptor: &LocatorDescriptor) -> Option<&FallbackEntry> {
        self.fallback_history
            .iter()
            .find(|e| &e.descriptor == descriptor)
    }

    /// Fallback descriptors, most reliable first
    pub fn fallback_descriptors(&self) -> impl Iterator<Item = &LocatorDescriptor> {
        self.fallback_history.iter().map(|e| &e.descriptor)
    }

    /// Total number of successful heals
    #[must_use]
    pub fn heal_count(&self) -> u64 {
        self.fallback_history
            .iter()
            .map(|e| e.stats.success_count)
            .sum()
    }

    /// Whether the history satisfies the ordering and uniqueness invariants
    #[must_use]
    pub fn is_well_ordered(&self) -> bool {
        let sorted = self
            .fallback_history
            .windows(2)
            .all(|w| w[0].reliability_cmp(&w[1]) != Ordering::Greater);
        let unique = self.fallback_history.iter().enumerate().all(|(i, e)| {
            self.fallback_history[..i]
                .iter()
                .all(|other| other.descriptor != e.descriptor)
        });
        sorted && unique
    }
}
