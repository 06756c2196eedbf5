//! Directory of JSON files, one per logical name.
//!
//! Each file holds `{"version": n, "record": {...}}`. Writes go to a temp file
//! in the same directory and are renamed into place, so readers never see a
//! torn record. Compare-and-swap is serialized per key inside this process;
//! processes sharing a directory are not coordinated.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use super::backend::{CasOutcome, PersistenceBackend, Versioned};
use crate::record::LocatorRecord;
use crate::result::{SanarError, SanarResult};

const EXTENSION: &str = "json";

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    version: u64,
    record: LocatorRecord,
}

/// JSON-file backend rooted at a directory
#[derive(Debug)]
pub struct JsonFileBackend {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl JsonFileBackend {
    /// Open (and create if needed) a store directory
    pub fn open(root: impl Into<PathBuf>) -> SanarResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Store directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `name`
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", encode_name(name)))
    }

    fn key_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(name.to_string()).or_default())
    }

    /// Drop the per-key lock once no other writer holds or waits on it
    fn release_lock(&self, name: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        // the map and `lock` itself
        if Arc::strong_count(lock) == 2 {
            locks.remove(name);
        }
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.lock().len()
    }

    async fn read(&self, name: &str) -> SanarResult<Option<Versioned>> {
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SanarError::persistence(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let stored: StoredRecord = serde_json::from_str(&content).map_err(|e| {
            SanarError::persistence(format!("corrupt record {}: {e}", path.display()))
        })?;
        Ok(Some(Versioned {
            version: stored.version,
            record: stored.record,
        }))
    }

    async fn write(&self, name: &str, stored: &StoredRecord) -> SanarResult<()> {
        let path = self.path_for(name);
        let tmp_path = self.root.join(format!(
            ".{}.{}.tmp",
            encode_name(name),
            uuid::Uuid::new_v4().simple()
        ));
        let json = serde_json::to_string_pretty(stored)?;
        let written = async {
            fs::write(&tmp_path, json).await?;
            fs::rename(&tmp_path, &path).await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(SanarError::persistence(format!(
                "failed to write {}: {e}",
                path.display()
            )));
        }
        debug!(name, version = stored.version, "Stored locator record");
        Ok(())
    }

    async fn swap_locked(
        &self,
        name: &str,
        expected: Option<u64>,
        record: &LocatorRecord,
    ) -> SanarResult<CasOutcome> {
        let current = self.read(name).await?.map(|v| v.version);
        if current != expected {
            return Ok(CasOutcome::Conflict { current });
        }
        let version = current.map_or(1, |v| v + 1);
        self.write(
            name,
            &StoredRecord {
                version,
                record: record.clone(),
            },
        )
        .await?;
        Ok(CasOutcome::Swapped { version })
    }
}

#[async_trait]
impl PersistenceBackend for JsonFileBackend {
    async fn load(&self, name: &str) -> SanarResult<Option<Versioned>> {
        self.read(name).await
    }

    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        record: &LocatorRecord,
    ) -> SanarResult<CasOutcome> {
        let lock = self.key_lock(name);
        let outcome = {
            let _guard = lock.lock().await;
            self.swap_locked(name, expected, record).await
        };
        self.release_lock(name, &lock);
        outcome
    }

    async fn names(&self) -> SanarResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(name) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.starts_with('.'))
                .and_then(decode_name)
            {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Percent-encode everything outside `[A-Za-z0-9_-]`.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
