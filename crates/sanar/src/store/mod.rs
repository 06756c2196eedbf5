//! Locator store: logical name → resolution history.
//!
//! All mutation goes through [`LocatorStore::record_attempt`], a bounded
//! compare-and-swap loop over the [`PersistenceBackend`]. Concurrent workers
//! updating the same logical name never lose each other's updates: a writer
//! that loses the race reloads the record, re-applies its attempt and tries
//! again.

mod backend;
mod file;

pub use backend::{CasOutcome, MemoryBackend, PersistenceBackend, Versioned};
pub use file::JsonFileBackend;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::record::{AttemptUpdate, LocatorRecord};
use crate::result::{SanarError, SanarResult};

/// Default number of compare-and-swap attempts before giving up
pub const DEFAULT_MAX_CAS_RETRIES: usize = 16;

/// Shared, persistent record store
#[derive(Debug, Clone)]
pub struct LocatorStore {
    backend: Arc<dyn PersistenceBackend>,
    max_retries: usize,
}

impl LocatorStore {
    /// Create a store over a backend
    #[must_use]
    pub fn new(backend: impl PersistenceBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Create a store over a shared backend
    #[must_use]
    pub fn from_arc(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            max_retries: DEFAULT_MAX_CAS_RETRIES,
        }
    }

    /// Create an in-process store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Open a JSON-file store in `dir`
    pub fn open_dir(dir: impl Into<PathBuf>) -> SanarResult<Self> {
        Ok(Self::new(JsonFileBackend::open(dir)?))
    }

    /// Set the compare-and-swap retry bound
    #[must_use]
    pub const fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Load a record
    pub async fn get(&self, name: &str) -> SanarResult<Option<LocatorRecord>> {
        Ok(self.backend.load(name).await?.map(|v| v.record))
    }

    /// Insert or replace a record wholesale
    pub async fn upsert(&self, record: LocatorRecord) -> SanarResult<()> {
        let name = record.logical_name.clone();
        for _ in 0..self.max_retries.max(1) {
            let expected = self.backend.load(&name).await?.map(|v| v.version);
            match self.backend.compare_and_swap(&name, expected, &record).await? {
                CasOutcome::Swapped { .. } => return Ok(()),
                CasOutcome::Conflict { current } => {
                    debug!(name = %name, ?current, "Upsert lost a race, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }
        Err(self.exhausted(&name))
    }

    /// Fold one attempt into the record for `name`.
    ///
    /// Returns the updated record, or `None` when the attempt failed and no
    /// record exists yet (records are created by the first success).
    pub async fn record_attempt(
        &self,
        name: &str,
        update: &AttemptUpdate,
    ) -> SanarResult<Option<LocatorRecord>> {
        for _ in 0..self.max_retries.max(1) {
            let current = self.backend.load(name).await?;
            let expected = current.as_ref().map(|v| v.version);
            let next = match current {
                Some(versioned) => {
                    let mut record = versioned.record;
                    record.apply(update);
                    record
                }
                None => match LocatorRecord::from_first_success(name, update) {
                    Some(record) => record,
                    None => return Ok(None),
                },
            };

            match self.backend.compare_and_swap(name, expected, &next).await? {
                CasOutcome::Swapped { version } => {
                    debug!(
                        name,
                        version,
                        descriptor = %update.descriptor,
                        success = update.success,
                        "Recorded attempt"
                    );
                    return Ok(Some(next));
                }
                CasOutcome::Conflict { current } => {
                    debug!(name, ?current, "Concurrent update, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }
        Err(self.exhausted(name))
    }

    /// All logical names, sorted
    pub async fn list(&self) -> SanarResult<Vec<String>> {
        let mut names = self.backend.names().await?;
        names.sort();
        Ok(names)
    }

    fn exhausted(&self, name: &str) -> SanarError {
        warn!(name, retries = self.max_retries, "Gave up on contended record");
        SanarError::persistence(format!(
            "record '{name}' still contended after {} attempts",
            self.max_retries
        ))
    }
}
