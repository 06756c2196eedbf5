//! Heal journal: append-only JSON-lines log of every heal.
//!
//! One line per heal, so a report can show which locators drifted, what
//! replaced them, and how confident the resolver was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::attempt::CandidateSource;
use crate::locator::LocatorDescriptor;
use crate::result::{SanarError, SanarResult};

/// One heal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealEvent {
    /// Event id
    pub id: Uuid,
    /// When the heal happened
    pub timestamp: DateTime<Utc>,
    /// Logical name, when the descriptor carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_name: Option<String>,
    /// Descriptor the caller asked for
    pub original: LocatorDescriptor,
    /// Descriptor that resolved instead
    pub healed: LocatorDescriptor,
    /// Where the healed descriptor came from
    pub source: CandidateSource,
    /// Rank of the healed descriptor among attempts
    pub rank: usize,
    /// Confidence reported to the caller
    pub confidence: f64,
    /// Verifier score when several elements matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl HealEvent {
    /// Create an event stamped now
    #[must_use]
    pub fn new(
        original: &LocatorDescriptor,
        healed: &LocatorDescriptor,
        source: CandidateSource,
        rank: usize,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            logical_name: original.logical_name().map(str::to_string),
            original: original.without_logical_name(),
            healed: healed.without_logical_name(),
            source,
            rank,
            confidence,
            score: None,
        }
    }

    /// Attach the verifier score
    #[must_use]
    pub const fn with_score(mut self, score: Option<f64>) -> Self {
        self.score = score;
        self
    }
}

/// Append-only heal log
#[derive(Debug)]
pub struct HealJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HealJournal {
    /// Create a journal writing to `path` (created on first append)
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Journal file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a JSON line
    pub async fn append(&self, event: &HealEvent) -> SanarResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                SanarError::persistence(format!(
                    "failed to open heal journal {}: {e}",
                    self.path.display()
                ))
            })?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every event in `path`; malformed lines are skipped with a warning
    pub async fn read(path: &Path) -> SanarResult<Vec<HealEvent>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut events = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(line = number + 1, error = %e, "Skipping malformed heal journal line"),
            }
        }
        Ok(events)
    }
}
