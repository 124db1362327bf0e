//! Notes: vendor tuning recipes and their lifecycle.
//!
//! A note moves `Uninitialised -> Initialised -> Optimised -> Applied` and
//! from `Applied` to the terminal `Reverted`. Initialise reads the live value
//! of every declared tunable, optimise works out the desired values and the
//! measurements merge needs, apply merges, saves the original and writes.
//! Revert only needs the saved state, see [`revert_note`].

pub mod catalog;
pub mod definition;
pub mod ini;
pub mod lifecycle;
pub mod paging;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use catalog::{NoteCatalog, NoteInfo};
pub use definition::NoteDefinition;
pub use ini::IniNote;
pub use lifecycle::{revert_note, PreviewRow, TunableEntry};
pub use paging::{PagingNote, PAGING_NOTE_ID};

use crate::error::Result;
use crate::lock::ServiceLock;
use crate::saved_state::SavedStateStore;
use crate::system::System;
use lifecycle::NoteCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteState {
    Uninitialised,
    Initialised,
    Optimised,
    Applied,
    Reverted,
}

impl NoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteState::Uninitialised => "uninitialised",
            NoteState::Initialised => "initialised",
            NoteState::Optimised => "optimised",
            NoteState::Applied => "applied",
            NoteState::Reverted => "reverted",
        }
    }
}

impl fmt::Display for NoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities every note variant provides
pub trait NoteLifecycle {
    fn id(&self) -> &str;
    fn description(&self) -> &str;
    fn state(&self) -> NoteState;

    /// Read the live value of every tunable the note declares.
    fn initialise(&mut self, sys: &dyn System) -> Result<()>;

    /// Compute desired values and take the measurements merge depends on.
    fn optimise(&mut self, sys: &dyn System) -> Result<()>;

    /// Merge, save the original and write, key by key.
    ///
    /// Every key is attempted; failures come back together as
    /// [`TuneError::NoteFailed`](crate::error::TuneError::NoteFailed).
    fn apply(&mut self, sys: &dyn System, store: &SavedStateStore, lock: &ServiceLock) -> Result<()>;
}

/// Closed set of note variants
#[derive(Debug, Clone)]
pub enum Note {
    Ini(IniNote),
    Paging(PagingNote),
}

impl Note {
    fn core(&self) -> &NoteCore {
        match self {
            Note::Ini(n) => &n.core,
            Note::Paging(n) => &n.core,
        }
    }

    fn core_mut(&mut self) -> &mut NoteCore {
        match self {
            Note::Ini(n) => &mut n.core,
            Note::Paging(n) => &mut n.core,
        }
    }

    pub fn entries(&self) -> &[TunableEntry] {
        &self.core().entries
    }

    /// Current, desired and merged value per key; never touches the system.
    pub fn preview(&self) -> Result<Vec<PreviewRow>> {
        self.core().preview()
    }

    /// Run initialise and optimise back to back.
    pub fn prepare(&mut self, sys: &dyn System) -> Result<()> {
        self.initialise(sys)?;
        self.optimise(sys)
    }

    /// Put back what apply changed and mark the note reverted.
    pub fn revert(&mut self, sys: &dyn System, store: &SavedStateStore, lock: &ServiceLock) -> Result<()> {
        let core = self.core_mut();
        core.check(NoteState::Applied, NoteState::Reverted)?;
        revert_note(sys, store, lock, &core.id)?;
        core.state = NoteState::Reverted;
        Ok(())
    }
}

impl NoteLifecycle for Note {
    fn id(&self) -> &str {
        &self.core().id
    }

    fn description(&self) -> &str {
        &self.core().description
    }

    fn state(&self) -> NoteState {
        self.core().state
    }

    fn initialise(&mut self, sys: &dyn System) -> Result<()> {
        match self {
            Note::Ini(n) => n.initialise(sys),
            Note::Paging(n) => n.initialise(sys),
        }
    }

    fn optimise(&mut self, sys: &dyn System) -> Result<()> {
        match self {
            Note::Ini(n) => n.optimise(sys),
            Note::Paging(n) => n.optimise(sys),
        }
    }

    fn apply(&mut self, sys: &dyn System, store: &SavedStateStore, lock: &ServiceLock) -> Result<()> {
        match self {
            Note::Ini(n) => n.apply(sys, store, lock),
            Note::Paging(n) => n.apply(sys, store, lock),
        }
    }
}
