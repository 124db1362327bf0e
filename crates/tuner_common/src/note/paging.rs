//! 1557506 - Linux paging improvements.
//!
//! The note file holds plain settings rather than tunables:
//! `ENABLE_PAGECACHE_LIMIT`, `OVERRIDE_PAGECACHE_LIMIT_MB` and
//! `PAGECACHE_LIMIT_IGNORE_DIRTY`. The page cache limit follows from them and
//! from the machine's main memory.

use std::path::PathBuf;

use super::lifecycle::{NoteCore, TunableEntry};
use super::{NoteLifecycle, NoteState};
use crate::error::Result;
use crate::lock::ServiceLock;
use crate::saved_state::SavedStateStore;
use crate::sysconfig::{ConfigSource, SysconfigFile};
use crate::system::System;
use crate::tunable::{Family, TunableContext, TunableKey};

pub const PAGING_NOTE_ID: &str = "1557506";
pub const PAGING_NOTE_NAME: &str = "Linux paging improvements";

const KEYS: [&str; 3] = [
    "ENABLE_PAGECACHE_LIMIT",
    "PAGECACHE_LIMIT_IGNORE_DIRTY",
    "OVERRIDE_PAGECACHE_LIMIT_MB",
];

#[derive(Debug, Clone)]
pub struct PagingNote {
    pub(crate) core: NoteCore,
    /// Settings files, later ones win
    sources: Vec<PathBuf>,
}

impl PagingNote {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            core: NoteCore::new(PAGING_NOTE_ID, PAGING_NOTE_NAME),
            sources,
        }
    }

    fn settings(&self) -> Result<SysconfigFile> {
        let mut conf = SysconfigFile::default();
        for path in &self.sources {
            conf.overlay(SysconfigFile::load(path)?);
        }
        Ok(conf)
    }
}

impl NoteLifecycle for PagingNote {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn description(&self) -> &str {
        &self.core.description
    }

    fn state(&self) -> NoteState {
        self.core.state
    }

    fn initialise(&mut self, sys: &dyn System) -> Result<()> {
        self.core.transition(NoteState::Uninitialised, NoteState::Initialised)?;
        self.core.entries = KEYS
            .iter()
            .map(|name| {
                TunableEntry::new(TunableKey::new(Family::Pagecache, *name), TunableContext::default(), "")
            })
            .collect();
        self.core.read_current(sys);
        Ok(())
    }

    fn optimise(&mut self, sys: &dyn System) -> Result<()> {
        self.core.check(NoteState::Initialised, NoteState::Optimised)?;
        let conf = self.settings()?;
        let enabled = conf.get_bool("ENABLE_PAGECACHE_LIMIT", false);
        let ignore_dirty = conf.get_int("PAGECACHE_LIMIT_IGNORE_DIRTY", 1);
        let override_mb = conf.get_int("OVERRIDE_PAGECACHE_LIMIT_MB", 0).max(0);

        self.core.measure(sys);
        for entry in &mut self.core.entries {
            entry.ctx.pagecache_enabled = Some(enabled);
            entry.desired = match entry.key.name.as_str() {
                "ENABLE_PAGECACHE_LIMIT" => if enabled { "yes" } else { "no" }.to_string(),
                "PAGECACHE_LIMIT_IGNORE_DIRTY" => ignore_dirty.to_string(),
                _ => override_mb.to_string(),
            };
        }
        self.core.state = NoteState::Optimised;
        Ok(())
    }

    fn apply(&mut self, sys: &dyn System, store: &SavedStateStore, lock: &ServiceLock) -> Result<()> {
        self.core.apply(sys, store, lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::InMemorySystem;
    use crate::tunable::pagecache::{SYSCTL_IGNORE_DIRTY, SYSCTL_LIMIT_MB};
    use std::fs;
    use tempfile::TempDir;

    fn sys() -> InMemorySystem {
        InMemorySystem::new()
            .with_memory(32080, 40000)
            .with_sysctl(SYSCTL_LIMIT_MB, "0")
            .with_sysctl(SYSCTL_IGNORE_DIRTY, "1")
    }

    fn desired(note: &PagingNote) -> Vec<String> {
        note.core.entries.iter().map(|e| e.desired.clone()).collect()
    }

    #[test]
    fn test_disabled_without_settings() {
        let temp = TempDir::new().unwrap();
        let mut note = PagingNote::new(vec![temp.path().join("1557506")]);
        note.initialise(&sys()).unwrap();
        note.optimise(&sys()).unwrap();
        assert_eq!(desired(&note), vec!["no", "1", "0"]);

        let rows = note.core.preview().unwrap();
        assert_eq!(rows[2].merged.as_deref(), Some("0"));
    }

    #[test]
    fn test_enabled_uses_two_percent_and_override_wins() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("1557506");
        fs::write(&main, "ENABLE_PAGECACHE_LIMIT=\"yes\"\nPAGECACHE_LIMIT_IGNORE_DIRTY=0\n").unwrap();

        let mut note = PagingNote::new(vec![main.clone()]);
        note.prepare_for_test(&sys());
        let rows = note.core.preview().unwrap();
        assert_eq!(rows[0].merged.as_deref(), Some("yes"));
        assert_eq!(rows[1].merged.as_deref(), Some("0"));
        assert_eq!(rows[2].merged.as_deref(), Some("641"));

        let ovw = temp.path().join("override");
        fs::write(&ovw, "OVERRIDE_PAGECACHE_LIMIT_MB=1000\n").unwrap();
        let mut note = PagingNote::new(vec![main, ovw]);
        note.prepare_for_test(&sys());
        let rows = note.core.preview().unwrap();
        assert_eq!(rows[2].merged.as_deref(), Some("1000"));
    }

    impl PagingNote {
        fn prepare_for_test(&mut self, sys: &InMemorySystem) {
            self.initialise(sys).unwrap();
            self.optimise(sys).unwrap();
        }
    }
}
