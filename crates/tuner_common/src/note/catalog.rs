//! Available notes: definition files in the notes directory, optionally
//! shadowed by staged versions, plus per-note override files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::paging::PAGING_NOTE_NAME;
use super::{IniNote, Note, NoteDefinition, PagingNote, PAGING_NOTE_ID};
use crate::error::{Result, TuneError};
use crate::paths::TunerPaths;

/// Catalogue entry shown by `note list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteInfo {
    pub id: String,
    pub description: String,
    pub has_override: bool,
    pub staged: bool,
}

#[derive(Debug, Clone)]
pub struct NoteCatalog {
    paths: TunerPaths,
    use_staging: bool,
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|n| !n.starts_with('.') && !n.ends_with(".tmp"))
        .collect();
    names.sort();
    Ok(names)
}

impl NoteCatalog {
    pub fn new(paths: &TunerPaths, use_staging: bool) -> Self {
        Self {
            paths: paths.clone(),
            use_staging,
        }
    }

    fn staged_file(&self, id: &str) -> Option<PathBuf> {
        let path = self.paths.staging_dir().join(id);
        (self.use_staging && path.is_file()).then_some(path)
    }

    /// Definition file used for `id`: staged version first when staging is on.
    fn source(&self, id: &str) -> Option<PathBuf> {
        self.staged_file(id).or_else(|| {
            let path = self.paths.notes_dir().join(id);
            path.is_file().then_some(path)
        })
    }

    fn override_file(&self, id: &str) -> Option<PathBuf> {
        let path = self.paths.override_dir().join(id);
        path.is_file().then_some(path)
    }

    /// Note files waiting in the staging area
    pub fn staged(&self) -> Result<Vec<String>> {
        file_names(&self.paths.staging_dir())
    }

    pub fn list(&self) -> Result<Vec<NoteInfo>> {
        let mut ids = file_names(&self.paths.notes_dir())?;
        if self.use_staging {
            ids.extend(self.staged()?);
        }
        ids.push(PAGING_NOTE_ID.to_string());
        ids.sort();
        ids.dedup();

        ids.into_iter()
            .map(|id| -> Result<NoteInfo> {
                let description = if id == PAGING_NOTE_ID {
                    PAGING_NOTE_NAME.to_string()
                } else {
                    match self.source(&id) {
                        Some(path) => NoteDefinition::load(&id, &path)?.description,
                        None => String::new(),
                    }
                };
                Ok(NoteInfo {
                    has_override: self.override_file(&id).is_some(),
                    staged: self.staged_file(&id).is_some(),
                    description,
                    id,
                })
            })
            .collect()
    }

    /// Build the note `id` with its override applied.
    pub fn load(&self, id: &str) -> Result<Note> {
        if id == PAGING_NOTE_ID {
            let mut sources: Vec<PathBuf> = self.source(id).into_iter().collect();
            sources.extend(self.override_file(id));
            return Ok(Note::Paging(PagingNote::new(sources)));
        }

        let path = self
            .source(id)
            .ok_or_else(|| TuneError::NoteNotFound(id.to_string()))?;
        debug!("loading note {} from {}", id, path.display());
        let mut definition = NoteDefinition::load(id, &path)?;
        if let Some(ovw) = self.override_file(id) {
            debug!("applying override {}", ovw.display());
            definition.apply_override(&fs::read_to_string(ovw)?)?;
        }
        Ok(Note::Ini(IniNote::new(definition)))
    }
}
