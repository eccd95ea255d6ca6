//! Consumed-rule stores.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use trigger_core::error::StoreError;
use trigger_core::traits::ConsumedStore;

/// One consumed rule, as written to the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedEntry {
    pub id: String,
    pub raw: String,
    pub consumed_at: NaiveDateTime,
}

struct Journal {
    consumed: HashMap<String, ConsumedEntry>,
    file: File,
}

/// Append-only JSON-lines store.
///
/// Every mark appends one line and syncs it. On open, the journal is
/// replayed; unreadable lines are skipped with a warning. The mutex is the
/// single writer.
pub struct JsonlConsumedStore {
    path: PathBuf,
    journal: Mutex<Journal>,
}

impl JsonlConsumedStore {
    /// Open (or create) the journal at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut consumed = HashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (index, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ConsumedEntry>(&line) {
                    Ok(entry) => {
                        consumed.insert(entry.id.clone(), entry);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), line = index + 1, error = %e, "Skipping unreadable journal line");
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), consumed = consumed.len(), "Consumed-rule journal opened");

        Ok(Self {
            path,
            journal: Mutex::new(Journal { consumed, file }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All consumed entries.
    pub fn entries(&self) -> Result<Vec<ConsumedEntry>, StoreError> {
        let journal = self.journal.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(journal.consumed.values().cloned().collect())
    }
}

impl ConsumedStore for JsonlConsumedStore {
    fn is_consumed(&self, id: &str) -> Result<bool, StoreError> {
        let journal = self.journal.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(journal.consumed.contains_key(id))
    }

    fn mark_consumed(&self, id: &str, raw: &str) -> Result<(), StoreError> {
        let mut journal = self.journal.lock().map_err(|_| StoreError::Poisoned)?;
        if journal.consumed.contains_key(id) {
            return Ok(());
        }

        let entry = ConsumedEntry {
            id: id.to_string(),
            raw: raw.to_string(),
            consumed_at: Local::now().naive_local(),
        };
        let mut line =
            serde_json::to_string(&entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        line.push('\n');

        journal.file.write_all(line.as_bytes())?;
        journal.file.sync_data()?;
        journal.consumed.insert(entry.id.clone(), entry);

        info!(id, "Rule marked consumed");
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryConsumedStore {
    consumed: Mutex<HashMap<String, String>>,
}

impl MemoryConsumedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.consumed.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConsumedStore for MemoryConsumedStore {
    fn is_consumed(&self, id: &str) -> Result<bool, StoreError> {
        let consumed = self.consumed.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(consumed.contains_key(id))
    }

    fn mark_consumed(&self, id: &str, raw: &str) -> Result<(), StoreError> {
        let mut consumed = self.consumed.lock().map_err(|_| StoreError::Poisoned)?;
        consumed
            .entry(id.to_string())
            .or_insert_with(|| raw.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_journal() -> PathBuf {
        std::env::temp_dir()
            .join(format!("trigger-store-{}", uuid::Uuid::new_v4()))
            .join("consumed.jsonl")
    }

    #[test]
    fn test_journal_survives_reopen() {
        let path = temp_journal();

        let store = JsonlConsumedStore::open(&path).unwrap();
        assert!(!store.is_consumed("r1").unwrap());
        store.mark_consumed("r1", "r1,600000,...").unwrap();
        assert!(store.is_consumed("r1").unwrap());
        drop(store);

        let reopened = JsonlConsumedStore::open(&path).unwrap();
        assert!(reopened.is_consumed("r1").unwrap());
        assert!(!reopened.is_consumed("r2").unwrap());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_mark_is_idempotent() {
        let path = temp_journal();

        let store = JsonlConsumedStore::open(&path).unwrap();
        store.mark_consumed("r1", "first").unwrap();
        store.mark_consumed("r1", "second").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert_eq!(store.entries().unwrap()[0].raw, "first");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_line_skipped() {
        let path = temp_journal();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "not json\n{\"id\":\"r9\",\"raw\":\"x\",\"consumed_at\":\"2024-03-04T10:00:00\"}\n",
        )
        .unwrap();

        let store = JsonlConsumedStore::open(&path).unwrap();
        assert!(store.is_consumed("r9").unwrap());
        assert_eq!(store.entries().unwrap().len(), 1);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryConsumedStore::new();
        assert!(store.is_empty());
        store.mark_consumed("a", "raw").unwrap();
        assert!(store.is_consumed("a").unwrap());
        assert_eq!(store.len(), 1);
    }
}
