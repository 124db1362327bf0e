//! Saved-State Store: the value every tunable had before a note touched it.
//!
//! One JSON file per note under the saved-state directory, rewritten with
//! temp file + rename on every change. Only the first capture of a key is
//! kept, so applying a note twice still reverts to the original value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

use crate::error::Result;
use crate::paths::{atomic_write, TunerPaths};
use crate::tunable::{TunableContext, TunableKey};

/// Pre-apply value of one tunable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub key: TunableKey,
    #[serde(default)]
    pub ctx: TunableContext,
    pub value: String,
}

/// Saved entries of one note, in capture order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedNote {
    pub note: String,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<SavedEntry>,
}

impl SavedNote {
    fn new(note: &str) -> Self {
        Self {
            note: note.to_string(),
            saved_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &TunableKey) -> Option<&SavedEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }
}

#[derive(Debug, Clone)]
pub struct SavedStateStore {
    dir: PathBuf,
}

impl SavedStateStore {
    pub fn new(paths: &TunerPaths) -> Self {
        Self {
            dir: paths.saved_state_dir(),
        }
    }

    fn file(&self, note: &str) -> PathBuf {
        self.dir.join(format!("{}.json", note))
    }

    pub fn load(&self, note: &str) -> Result<Option<SavedNote>> {
        match fs::read_to_string(self.file(note)) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `saved`, or delete the note's file once nothing is left in it.
    pub fn store(&self, saved: &SavedNote) -> Result<()> {
        if saved.entries.is_empty() {
            return self.remove(&saved.note);
        }
        let content = serde_json::to_string_pretty(saved)?;
        atomic_write(&self.file(&saved.note), content.as_bytes())?;
        Ok(())
    }

    /// Capture the pre-apply value of `key`.
    ///
    /// Returns `false` when the key was captured before; the stored value
    /// stays untouched then.
    pub fn record(&self, note: &str, key: &TunableKey, ctx: &TunableContext, value: &str) -> Result<bool> {
        let mut saved = self.load(note)?.unwrap_or_else(|| SavedNote::new(note));
        if saved.get(key).is_some() {
            debug!("{}: {} already saved, keeping first capture", note, key);
            return Ok(false);
        }
        saved.entries.push(SavedEntry {
            key: key.clone(),
            ctx: ctx.clone(),
            value: value.to_string(),
        });
        self.store(&saved)?;
        Ok(true)
    }

    /// Drop one captured key, e.g. after its write failed.
    pub fn forget(&self, note: &str, key: &TunableKey) -> Result<()> {
        if let Some(mut saved) = self.load(note)? {
            saved.entries.retain(|e| &e.key != key);
            self.store(&saved)?;
        }
        Ok(())
    }

    pub fn remove(&self, note: &str) -> Result<()> {
        match fs::remove_file(self.file(note)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Notes with saved state, sorted by id
    pub fn notes(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut notes: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(".json"))
                    .map(str::to_string)
            })
            .collect();
        notes.sort();
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunable::Family;
    use tempfile::TempDir;

    fn store() -> (TempDir, SavedStateStore) {
        let temp = TempDir::new().unwrap();
        let store = SavedStateStore::new(&TunerPaths::with_root(temp.path()));
        (temp, store)
    }

    #[test]
    fn test_first_capture_wins() {
        let (_temp, store) = store();
        let key = TunableKey::new(Family::Sysctl, "vm.swappiness");
        let ctx = TunableContext::default();
        assert!(store.record("941735", &key, &ctx, "60").unwrap());
        assert!(!store.record("941735", &key, &ctx, "10").unwrap());

        let saved = store.load("941735").unwrap().unwrap();
        assert_eq!(saved.entries.len(), 1);
        assert_eq!(saved.get(&key).unwrap().value, "60");
    }

    #[test]
    fn test_capture_order_and_context_survive_reload() {
        let (_temp, store) = store();
        let ctx = TunableContext {
            limit_item: Some("nofile".to_string()),
            limit_domains: vec!["@sapsys".to_string()],
            ..Default::default()
        };
        let soft = TunableKey::new(Family::Limits, "LIMIT_SOFT");
        let hard = TunableKey::new(Family::Limits, "LIMIT_HARD");
        store.record("1771258", &soft, &ctx, "@sapsys:1024 ").unwrap();
        store.record("1771258", &hard, &ctx, "@sapsys:4096 ").unwrap();

        let saved = store.load("1771258").unwrap().unwrap();
        let keys: Vec<_> = saved.entries.iter().map(|e| e.key.clone()).collect();
        assert_eq!(keys, vec![soft, hard]);
        assert_eq!(saved.entries[0].ctx, ctx);
    }

    #[test]
    fn test_forget_last_key_removes_file() {
        let (_temp, store) = store();
        let key = TunableKey::new(Family::Vm, "THP");
        store.record("2205917", &key, &TunableContext::default(), "always").unwrap();
        assert_eq!(store.notes().unwrap(), vec!["2205917"]);

        store.forget("2205917", &key).unwrap();
        assert!(store.load("2205917").unwrap().is_none());
        assert!(store.notes().unwrap().is_empty());
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let (_temp, store) = store();
        assert!(store.notes().unwrap().is_empty());
        assert!(store.load("nothing").unwrap().is_none());
        store.remove("nothing").unwrap();
    }
}
