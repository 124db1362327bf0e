//! tuner configuration, `/etc/tuner/tuner.toml`.
//!
//! Every field has a serde default, so an absent file or a file with only a
//! few keys is valid. The apply order is written back after every apply and
//! revert.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

use crate::error::Result;
use crate::paths::{atomic_write, TunerPaths};

/// Unit names the arbiter works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNames {
    /// tuner's own service
    #[serde(default = "default_own")]
    pub own: String,

    /// Daemon that tunes the same resources
    #[serde(default = "default_competitor")]
    pub competitor: String,

    /// Third-party helper stopped before any takeover
    #[serde(default = "default_helper")]
    pub helper: String,
}

fn default_own() -> String {
    "tuner.service".to_string()
}

fn default_competitor() -> String {
    "sapconf.service".to_string()
}

fn default_helper() -> String {
    "tuned.service".to_string()
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            own: default_own(),
            competitor: default_competitor(),
            helper: default_helper(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Enabled note ids
    #[serde(default)]
    pub notes: Vec<String>,

    /// Ids in the order they were applied; revert-all walks it backwards
    #[serde(default)]
    pub note_apply_order: Vec<String>,

    /// Whether staged note definitions are used
    #[serde(default)]
    pub staging: bool,

    #[serde(default)]
    pub services: ServiceNames,
}

impl TunerConfig {
    /// Missing file yields the defaults; a malformed file is an error.
    pub fn load(paths: &TunerPaths) -> Result<Self> {
        let path = paths.config_file();
        match fs::read_to_string(&path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, paths: &TunerPaths) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        atomic_write(&paths.config_file(), content.as_bytes())?;
        Ok(())
    }

    pub fn is_enabled(&self, note: &str) -> bool {
        self.notes.iter().any(|n| n == note)
    }

    pub fn is_applied(&self, note: &str) -> bool {
        self.note_apply_order.iter().any(|n| n == note)
    }

    pub fn enable_note(&mut self, note: &str) {
        if !self.is_enabled(note) {
            self.notes.push(note.to_string());
        }
    }

    /// Append to the apply order; a repeated apply keeps the first position.
    pub fn record_applied(&mut self, note: &str) {
        if !self.is_applied(note) {
            self.note_apply_order.push(note.to_string());
        }
    }

    /// Forget a note entirely, as after a revert.
    pub fn remove_note(&mut self, note: &str) {
        self.notes.retain(|n| n != note);
        self.note_apply_order.retain(|n| n != note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = TunerConfig::load(&TunerPaths::with_root(temp.path())).unwrap();
        assert!(config.notes.is_empty());
        assert_eq!(config.services.own, "tuner.service");
        assert_eq!(config.services.competitor, "sapconf.service");
        assert_eq!(config.services.helper, "tuned.service");
    }

    #[test]
    fn test_partial_file() {
        let temp = TempDir::new().unwrap();
        let paths = TunerPaths::with_root(temp.path());
        fs::create_dir_all(paths.config_file().parent().unwrap()).unwrap();
        fs::write(
            paths.config_file(),
            "notes = [\"1557506\"]\n[services]\ncompetitor = \"other.service\"\n",
        )
        .unwrap();
        let config = TunerConfig::load(&paths).unwrap();
        assert_eq!(config.notes, vec!["1557506"]);
        assert_eq!(config.services.competitor, "other.service");
        assert_eq!(config.services.own, "tuner.service");
        assert!(!config.staging);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let paths = TunerPaths::with_root(temp.path());
        fs::create_dir_all(paths.config_file().parent().unwrap()).unwrap();
        fs::write(paths.config_file(), "notes = [").unwrap();
        assert!(TunerConfig::load(&paths).is_err());
    }

    #[test]
    fn test_save_roundtrip_and_order() {
        let temp = TempDir::new().unwrap();
        let paths = TunerPaths::with_root(temp.path());
        let mut config = TunerConfig::default();
        config.enable_note("941735");
        config.record_applied("941735");
        config.enable_note("1557506");
        config.record_applied("1557506");
        config.record_applied("941735");
        config.save(&paths).unwrap();

        let mut loaded = TunerConfig::load(&paths).unwrap();
        assert_eq!(loaded.note_apply_order, vec!["941735", "1557506"]);
        loaded.remove_note("941735");
        assert_eq!(loaded.notes, vec!["1557506"]);
        assert_eq!(loaded.note_apply_order, vec!["1557506"]);
    }
}
