//! Application layer: notes as the user sees them, enabled or applied, in
//! the order they were applied.

use tracing::{error, info};

use crate::config::TunerConfig;
use crate::error::{Result, TuneError};
use crate::lock::ServiceLock;
use crate::note::{revert_note, NoteCatalog, NoteLifecycle, PreviewRow};
use crate::paths::TunerPaths;
use crate::saved_state::SavedStateStore;
use crate::system::System;

pub struct TuneApp<'a> {
    sys: &'a dyn System,
    paths: TunerPaths,
    pub config: TunerConfig,
    store: SavedStateStore,
}

impl<'a> TuneApp<'a> {
    pub fn new(sys: &'a dyn System, paths: TunerPaths) -> Result<Self> {
        let config = TunerConfig::load(&paths)?;
        let store = SavedStateStore::new(&paths);
        Ok(Self {
            sys,
            paths,
            config,
            store,
        })
    }

    pub fn catalog(&self) -> NoteCatalog {
        NoteCatalog::new(&self.paths, self.config.staging)
    }

    /// Notes that currently have saved state
    pub fn applied_notes(&self) -> Result<Vec<String>> {
        self.store.notes()
    }

    /// Enable and apply one note.
    ///
    /// The note counts as applied even when some keys failed: its saved
    /// state covers the keys that did change and revert needs to find it.
    pub fn apply_note(&mut self, id: &str, lock: &ServiceLock) -> Result<()> {
        let mut note = self.catalog().load(id)?;
        info!("applying note {} ({})", id, note.description());
        note.prepare(self.sys)?;
        let outcome = note.apply(self.sys, &self.store, lock);
        self.config.enable_note(id);
        self.config.record_applied(id);
        self.config.save(&self.paths)?;
        outcome
    }

    /// Revert one note and forget it, so it is not applied again.
    pub fn revert_note(&mut self, id: &str, lock: &ServiceLock) -> Result<()> {
        if !self.config.is_enabled(id) && self.store.load(id)?.is_none() {
            return Err(TuneError::NoteNotFound(id.to_string()));
        }
        revert_note(self.sys, &self.store, lock, id)?;
        self.config.remove_note(id);
        self.config.save(&self.paths)
    }

    /// Current, desired and merged values without touching the system.
    pub fn simulate(&self, id: &str) -> Result<Vec<PreviewRow>> {
        let mut note = self.catalog().load(id)?;
        note.prepare(self.sys)?;
        note.preview()
    }

    /// Apply every enabled note: known apply order first, then notes that
    /// were enabled but never applied. A failing note does not stop the
    /// others unless the failure is fatal; the first failure is returned.
    pub fn tune_all(&mut self, lock: &ServiceLock) -> Result<()> {
        let mut order = self.config.note_apply_order.clone();
        for id in &self.config.notes {
            if !order.contains(id) {
                order.push(id.clone());
            }
        }
        let mut first_error = None;
        for id in order {
            match self.apply_note(&id, lock) {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("{}", e);
                    first_error.get_or_insert(e);
                }
                Ok(()) => {}
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Revert every applied note, last applied first.
    ///
    /// `permanent` also drops the notes from the configuration; a service
    /// stop keeps them so the next start applies them again.
    pub fn revert_all(&mut self, permanent: bool, lock: &ServiceLock) -> Result<()> {
        let mut order: Vec<String> = self.config.note_apply_order.iter().rev().cloned().collect();
        for id in self.store.notes()? {
            if !order.contains(&id) {
                order.push(id);
            }
        }
        let mut first_error = None;
        for id in &order {
            match revert_note(self.sys, &self.store, lock, id) {
                Ok(()) if permanent => self.config.remove_note(id),
                Ok(()) => {}
                Err(e) => {
                    error!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if permanent {
            self.config.save(&self.paths)?;
        }
        first_error.map_or(Ok(()), Err)
    }
}
