//! Notes built from a definition file.

use super::lifecycle::{NoteCore, TunableEntry};
use super::{NoteDefinition, NoteLifecycle, NoteState};
use crate::error::Result;
use crate::lock::ServiceLock;
use crate::saved_state::SavedStateStore;
use crate::system::System;
use crate::tunable::{mem, Family, TunableKey};

#[derive(Debug, Clone)]
pub struct IniNote {
    pub(crate) core: NoteCore,
    definition: NoteDefinition,
}

impl IniNote {
    pub fn new(definition: NoteDefinition) -> Self {
        Self {
            core: NoteCore::new(definition.id.clone(), definition.description.clone()),
            definition,
        }
    }

    pub fn definition(&self) -> &NoteDefinition {
        &self.definition
    }
}

impl NoteLifecycle for IniNote {
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
        self.core.entries = self
            .definition
            .tunables
            .iter()
            .map(|(key, desired)| {
                TunableEntry::new(key.clone(), self.definition.context(key.family), desired.clone())
            })
            .collect();
        self.core.read_current(sys);
        Ok(())
    }

    fn optimise(&mut self, sys: &dyn System) -> Result<()> {
        self.core.transition(NoteState::Initialised, NoteState::Optimised)?;
        self.core.measure(sys);

        let percent_key = TunableKey::new(Family::Mem, "VSZ_TMPFS_PERCENT");
        let tmpfs_percent = match self.definition.desired(&percent_key) {
            Some(raw) => Some(mem::tmpfs_percent(&percent_key, raw)?),
            None => None,
        };
        let pagecache_enabled = self
            .definition
            .desired(&TunableKey::new(Family::Pagecache, "ENABLE_PAGECACHE_LIMIT"))
            .map(|v| v.eq_ignore_ascii_case("yes"));

        for entry in &mut self.core.entries {
            match entry.key.family {
                Family::Mem => entry.ctx.tmpfs_percent = tmpfs_percent,
                Family::Pagecache => entry.ctx.pagecache_enabled = pagecache_enabled,
                _ => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, sys: &dyn System, store: &SavedStateStore, lock: &ServiceLock) -> Result<()> {
        self.core.apply(sys, store, lock)
    }
}
