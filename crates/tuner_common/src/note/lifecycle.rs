//! Shared lifecycle machinery of the note variants.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::NoteState;
use crate::error::{KeyFailure, Result, TuneError};
use crate::lock::ServiceLock;
use crate::saved_state::SavedStateStore;
use crate::system::System;
use crate::tunable::{registry, Family, TunableContext, TunableKey};

/// One declared tunable and what the lifecycle learned about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunableEntry {
    pub key: TunableKey,
    pub ctx: TunableContext,
    /// Value the note asks for, before merging
    pub desired: String,
    /// Live value read during initialise
    pub current: Option<String>,
    /// Why initialise could not read the live value
    pub read_error: Option<String>,
    /// Value written during apply
    pub merged: Option<String>,
}

impl TunableEntry {
    pub fn new(key: TunableKey, ctx: TunableContext, desired: impl Into<String>) -> Self {
        Self {
            key,
            ctx,
            desired: desired.into(),
            current: None,
            read_error: None,
            merged: None,
        }
    }
}

/// One line of a simulated apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub key: String,
    pub current: String,
    pub desired: String,
    pub merged: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct NoteCore {
    pub id: String,
    pub description: String,
    pub state: NoteState,
    pub entries: Vec<TunableEntry>,
}

impl NoteCore {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            state: NoteState::Uninitialised,
            entries: Vec::new(),
        }
    }

    pub fn check(&self, from: NoteState, to: NoteState) -> Result<()> {
        if self.state != from {
            return Err(TuneError::InvalidTransition {
                note: self.id.clone(),
                from: self.state.as_str(),
                to: to.as_str(),
            });
        }
        Ok(())
    }

    pub fn transition(&mut self, from: NoteState, to: NoteState) -> Result<()> {
        self.check(from, to)?;
        self.state = to;
        Ok(())
    }

    /// Read every entry; a failing read is kept on the entry and reported
    /// by apply.
    pub fn read_current(&mut self, sys: &dyn System) {
        for entry in &mut self.entries {
            match registry::read(sys, &entry.key, &entry.ctx) {
                Ok(value) => {
                    entry.current = Some(value);
                    entry.read_error = None;
                }
                Err(e) => {
                    warn!("{}: cannot read {}: {}", self.id, entry.key, e);
                    entry.current = None;
                    entry.read_error = Some(e.to_string());
                }
            }
        }
    }

    /// Memory sizes for the families whose merge depends on them.
    pub fn measure(&mut self, sys: &dyn System) {
        let main = sys.main_memory_mb();
        let total = sys.total_memory_mb();
        for entry in &mut self.entries {
            if matches!(entry.key.family, Family::Limits | Family::Mem | Family::Pagecache) {
                entry.ctx.main_memory_mb = main;
                entry.ctx.total_memory_mb = total;
            }
        }
    }

    pub fn apply(&mut self, sys: &dyn System, store: &SavedStateStore, _lock: &ServiceLock) -> Result<()> {
        self.check(NoteState::Optimised, NoteState::Applied)?;
        let mut failures = Vec::new();
        for entry in &mut self.entries {
            if let Err(e) = apply_entry(sys, store, &self.id, entry) {
                warn!("{}: {}", self.id, e);
                failures.push(KeyFailure {
                    key: entry.key.clone(),
                    cause: e.to_string(),
                });
            }
        }
        self.state = NoteState::Applied;

        if failures.is_empty() {
            info!("note {} applied", self.id);
            Ok(())
        } else {
            Err(TuneError::NoteFailed {
                note: self.id.clone(),
                failures,
            })
        }
    }

    pub fn preview(&self) -> Result<Vec<PreviewRow>> {
        if !matches!(self.state, NoteState::Optimised | NoteState::Applied) {
            return Err(TuneError::InvalidTransition {
                note: self.id.clone(),
                from: self.state.as_str(),
                to: "simulated",
            });
        }
        Ok(self
            .entries
            .iter()
            .map(|entry| {
                let current = entry.current.clone().unwrap_or_default();
                let outcome = match &entry.read_error {
                    Some(e) => Err(e.clone()),
                    None => registry::merge(&entry.key, &current, &entry.desired, &entry.ctx)
                        .map_err(|e| e.to_string()),
                };
                let (merged, error) = match outcome {
                    Ok(m) => (Some(m), None),
                    Err(e) => (None, Some(e)),
                };
                PreviewRow {
                    key: entry.key.to_string(),
                    current,
                    desired: entry.desired.clone(),
                    merged,
                    error,
                }
            })
            .collect())
    }
}

/// merge -> save -> write for one key. A save that this call added is
/// dropped again when the write fails, so the store only holds keys that
/// were really changed.
///
/// A key captured by an earlier apply merges against that capture rather
/// than the live value, so applying the same note again writes the same
/// result.
fn apply_entry(sys: &dyn System, store: &SavedStateStore, note: &str, entry: &mut TunableEntry) -> Result<()> {
    let current = match (&entry.current, &entry.read_error) {
        (Some(current), _) => current.clone(),
        (None, Some(e)) => return Err(TuneError::apply(&entry.key, format!("read failed: {}", e))),
        (None, None) => return Err(TuneError::apply(&entry.key, "never read")),
    };
    let captured = store
        .load(note)?
        .and_then(|saved| saved.get(&entry.key).map(|e| e.value.clone()));
    let base = captured.as_deref().unwrap_or(&current);
    let merged = registry::merge(&entry.key, base, &entry.desired, &entry.ctx)?;
    let added = store.record(note, &entry.key, &entry.ctx, &current)?;
    if let Err(e) = registry::write(sys, &entry.key, &merged, &entry.ctx) {
        if added {
            store.forget(note, &entry.key)?;
        }
        return Err(e);
    }
    debug!("{}: {} = '{}'", note, entry.key, merged);
    entry.merged = Some(merged);
    Ok(())
}

/// Write back every saved value of `note`, newest capture first.
///
/// Keys that were restored leave the store; keys that failed stay, so a
/// later revert can retry them. Works without the note definition.
pub fn revert_note(sys: &dyn System, store: &SavedStateStore, _lock: &ServiceLock, note: &str) -> Result<()> {
    let Some(mut saved) = store.load(note)? else {
        info!("note {} has no saved state, nothing to revert", note);
        return Ok(());
    };

    let mut failures = Vec::new();
    let mut kept = Vec::new();
    for entry in saved.entries.drain(..).rev() {
        match registry::write(sys, &entry.key, &entry.value, &entry.ctx) {
            Ok(()) => debug!("{}: {} restored to '{}'", note, entry.key, entry.value),
            Err(e) => {
                warn!("{}: cannot restore {}: {}", note, entry.key, e);
                failures.push(KeyFailure {
                    key: entry.key.clone(),
                    cause: e.to_string(),
                });
                kept.push(entry);
            }
        }
    }
    kept.reverse();
    saved.entries = kept;
    store.store(&saved)?;

    if failures.is_empty() {
        info!("note {} reverted", note);
        Ok(())
    } else {
        Err(TuneError::NoteFailed {
            note: note.to_string(),
            failures,
        })
    }
}
