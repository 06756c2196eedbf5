//! Persistence backends with compare-and-swap writes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::record::LocatorRecord;
use crate::result::{SanarError, SanarResult};

/// A record together with its storage version
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    /// Monotonic per-key version, starting at 1
    pub version: u64,
    /// The stored record
    pub record: LocatorRecord,
}

/// Result of a compare-and-swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed; the key now has this version
    Swapped {
        /// New version
        version: u64,
    },
    /// Someone else wrote first
    Conflict {
        /// Version actually stored (`None` when the key is absent)
        current: Option<u64>,
    },
}

/// Durable key → record storage with per-key compare-and-swap
#[async_trait]
pub trait PersistenceBackend: Send + Sync + fmt::Debug {
    /// Load a record and its version
    async fn load(&self, name: &str) -> SanarResult<Option<Versioned>>;

    /// Write `record` if the stored version equals `expected`
    /// (`None` meaning "the key must not exist yet")
    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        record: &LocatorRecord,
    ) -> SanarResult<CasOutcome>;

    /// All stored logical names
    async fn names(&self) -> SanarResult<Vec<String>>;
}

/// In-process backend for tests and single-process runs
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, Versioned>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with a persistence error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> SanarResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SanarError::persistence("memory backend unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn load(&self, name: &str) -> SanarResult<Option<Versioned>> {
        self.check_available()?;
        Ok(self.records.lock().get(name).cloned())
    }

    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        record: &LocatorRecord,
    ) -> SanarResult<CasOutcome> {
        self.check_available()?;
        let mut records = self.records.lock();
        let current = records.get(name).map(|v| v.version);
        if current != expected {
            return Ok(CasOutcome::Conflict { current });
        }
        let version = current.map_or(1, |v| v + 1);
        records.insert(
            name.to_string(),
            Versioned {
                version,
                record: record.clone(),
            },
        );
        Ok(CasOutcome::Swapped { version })
    }

    async fn names(&self) -> SanarResult<Vec<String>> {
        self.check_available()?;
        Ok(self.records.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::LocatorDescriptor;
    use crate::record::AttemptUpdate;
    use crate::snapshot::AttributeSnapshot;

    fn record() -> LocatorRecord {
        let d = LocatorDescriptor::css("#a");
        LocatorRecord::from_first_success(
            "a",
            &AttemptUpdate::success(&d, &d, AttributeSnapshot::new().with_tag("a")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cas_create_then_update() {
        let backend = MemoryBackend::new();
        assert_eq!(
            backend.compare_and_swap("a", None, &record()).await.unwrap(),
            CasOutcome::Swapped { version: 1 }
        );
        assert_eq!(
            backend.compare_and_swap("a", Some(1), &record()).await.unwrap(),
            CasOutcome::Swapped { version: 2 }
        );
        assert_eq!(backend.load("a").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_cas_conflict() {
        let backend = MemoryBackend::new();
        backend.compare_and_swap("a", None, &record()).await.unwrap();
        assert_eq!(
            backend.compare_and_swap("a", None, &record()).await.unwrap(),
            CasOutcome::Conflict { current: Some(1) }
        );
        assert_eq!(
            backend.compare_and_swap("b", Some(3), &record()).await.unwrap(),
            CasOutcome::Conflict { current: None }
        );
    }

    #[tokio::test]
    async fn test_unavailable() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        assert!(matches!(
            backend.load("a").await,
            Err(SanarError::Persistence { .. })
        ));
        backend.set_unavailable(false);
        assert!(backend.load("a").await.unwrap().is_none());
    }
}
