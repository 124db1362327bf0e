//! Shell-style `KEY=value` configuration files, as used by sysconfig and by
//! note definitions that carry plain settings instead of tunables.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::error::Result;

/// Typed lookups with caller-supplied defaults
pub trait ConfigSource {
    fn get_string(&self, key: &str, default: &str) -> String;

    /// `yes`/`true`/`1` and `no`/`false`/`0`, case-insensitive
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get_string(key, "").to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => true,
            "no" | "false" | "0" => false,
            "" => default,
            other => {
                warn!("'{}' is not a boolean for {}, using {}", other, key, default);
                default
            }
        }
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        let raw = self.get_string(key, "");
        if raw.is_empty() {
            return default;
        }
        raw.parse().unwrap_or_else(|_| {
            warn!("'{}' is not an integer for {}, using {}", raw, key, default);
            default
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysconfigFile {
    entries: BTreeMap<String, String>,
}

impl SysconfigFile {
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| l.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), unquote(v.trim()).to_string()))
            .collect();
        Self { entries }
    }

    /// A missing file reads as empty, so every lookup takes its default.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Entries of `other` win over ours.
    pub fn overlay(&mut self, other: SysconfigFile) {
        self.entries.extend(other.entries);
    }
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = v.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    v
}

impl ConfigSource for SysconfigFile {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"## Type: yesno
# enable the limit
ENABLE_PAGECACHE_LIMIT="yes"
OVERRIDE_PAGECACHE_LIMIT_MB='1024'
PAGECACHE_LIMIT_IGNORE_DIRTY=2
BROKEN=abc
"#;

    #[test]
    fn test_typed_lookups() {
        let cfg = SysconfigFile::parse(SAMPLE);
        assert!(cfg.get_bool("ENABLE_PAGECACHE_LIMIT", false));
        assert_eq!(cfg.get_int("OVERRIDE_PAGECACHE_LIMIT_MB", 0), 1024);
        assert_eq!(cfg.get_int("PAGECACHE_LIMIT_IGNORE_DIRTY", 1), 2);
        assert_eq!(cfg.get_int("BROKEN", 7), 7);
        assert_eq!(cfg.get_string("MISSING", "dflt"), "dflt");
        assert!(!cfg.get_bool("MISSING", false));
    }

    #[test]
    fn test_load_from_disk() {
        let temp = TempDir::new().unwrap();
        let missing = SysconfigFile::load(&temp.path().join("none")).unwrap();
        assert_eq!(missing, SysconfigFile::default());

        let path = temp.path().join("1557506");
        fs::write(&path, SAMPLE).unwrap();
        let cfg = SysconfigFile::load(&path).unwrap();
        assert_eq!(cfg.get_string("ENABLE_PAGECACHE_LIMIT", "no"), "yes");
    }
}
