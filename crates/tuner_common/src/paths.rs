//! Filesystem layout. Every path hangs off a root so tests and
//! `tunerctl --root` can work inside a scratch directory.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const NOTES_DIR: &str = "usr/share/tuner/notes";
pub const OVERRIDE_DIR: &str = "etc/tuner/override";
pub const CONFIG_FILE: &str = "etc/tuner/tuner.toml";
pub const STAGING_DIR: &str = "var/lib/tuner/staging";
pub const SAVED_STATE_DIR: &str = "var/lib/tuner/saved_state";
pub const LOCK_FILE: &str = "run/.tuner.lock";
pub const TAKEOVER_MARKER: &str = "run/.tuner.takeover";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunerPaths {
    root: PathBuf,
}

impl Default for TunerPaths {
    fn default() -> Self {
        Self::with_root("/")
    }
}

impl TunerPaths {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.root.join(NOTES_DIR)
    }

    pub fn override_dir(&self) -> PathBuf {
        self.root.join(OVERRIDE_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn saved_state_dir(&self) -> PathBuf {
        self.root.join(SAVED_STATE_DIR)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn takeover_marker(&self) -> PathBuf {
        self.root.join(TAKEOVER_MARKER)
    }
}

/// Write to a sibling temp file, then rename over the target.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_follow_root() {
        let paths = TunerPaths::with_root("/tmp/x");
        assert_eq!(paths.lock_file(), PathBuf::from("/tmp/x/run/.tuner.lock"));
        assert_eq!(
            paths.saved_state_dir(),
            PathBuf::from("/tmp/x/var/lib/tuner/saved_state")
        );
        assert_eq!(
            TunerPaths::default().config_file(),
            PathBuf::from("/etc/tuner/tuner.toml")
        );
    }

    #[test]
    fn test_atomic_write_replaces_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/state.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!path.with_extension("tmp").exists());
    }
}
