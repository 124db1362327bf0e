//! Tunables: keys, families and the keyed token encoding shared by the codecs.
//!
//! A live value is either a scalar (`"10"`) or an ordered multiset of
//! `key@value` / `key:value` tokens separated by spaces
//! (`"sda@cfq sdb@none"`, `"@sapsys:32800 @dba:32800 "`).
//! Every codec keeps the key set and order of the current value.

pub mod block;
pub mod cpu;
pub mod grub;
pub mod limits;
pub mod login;
pub mod mem;
pub mod pagecache;
pub mod registry;
pub mod rpm;
pub mod service;
pub mod sysctl;
pub mod vm;

use std::fmt;

use serde::{Deserialize, Serialize};

use tracing::warn;

use crate::error::{Result, TuneError};
use crate::system::System;

/// Category of a tunable; selects the read/merge/write handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Sysctl,
    Block,
    Limits,
    Vm,
    Cpu,
    Mem,
    Pagecache,
    Grub,
    Service,
    Login,
    Rpm,
}

impl Family {
    pub const ALL: [Family; 11] = [
        Family::Sysctl,
        Family::Block,
        Family::Limits,
        Family::Vm,
        Family::Cpu,
        Family::Mem,
        Family::Pagecache,
        Family::Grub,
        Family::Service,
        Family::Login,
        Family::Rpm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Sysctl => "sysctl",
            Family::Block => "block",
            Family::Limits => "limits",
            Family::Vm => "vm",
            Family::Cpu => "cpu",
            Family::Mem => "mem",
            Family::Pagecache => "pagecache",
            Family::Grub => "grub",
            Family::Service => "service",
            Family::Login => "login",
            Family::Rpm => "rpm",
        }
    }

    /// Section name in a note definition file.
    pub fn from_section(s: &str) -> Option<Self> {
        Family::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Position in the handler registry.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one tunable inside a note: family plus instance name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TunableKey {
    pub family: Family,
    pub name: String,
}

impl TunableKey {
    pub fn new(family: Family, name: impl Into<String>) -> Self {
        Self {
            family,
            name: name.into(),
        }
    }
}

impl fmt::Display for TunableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.name)
    }
}

/// Extra inputs a handler needs beyond the key itself.
///
/// Stored next to a saved value, so a revert never needs the note definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunableContext {
    /// Limit item (`nofile`, `memlock`, ...) for the limits family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_item: Option<String>,
    /// Limit domains in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limit_domains: Vec<String>,
    /// Main memory in MB, measured during optimise
    #[serde(default)]
    pub main_memory_mb: u64,
    /// Main memory plus swap in MB, measured during optimise
    #[serde(default)]
    pub total_memory_mb: u64,
    /// Configured tmpfs percentage for /dev/shm sizing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmpfs_percent: Option<u64>,
    /// Page cache limit switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagecache_enabled: Option<bool>,
}

/// Split a keyed value into `(key, value)` pairs on `sep`.
///
/// Tokens without the separator are rejected; an empty value is kept as "".
pub fn split_tokens<'a>(
    key: &TunableKey,
    value: &'a str,
    sep: char,
) -> Result<Vec<(&'a str, &'a str)>> {
    value
        .split_whitespace()
        .map(|token| {
            token.split_once(sep).ok_or_else(|| {
                TuneError::parse(key, format!("token '{}' has no '{}' separator", token, sep))
            })
        })
        .collect()
}

/// Join `(key, value)` pairs with `sep`, single space between tokens.
pub fn join_tokens<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)], sep: char) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}{}{}", k.as_ref(), sep, v.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Selected entry of a sysfs selector (`"mq-deadline [none]"` -> `"none"`).
pub(crate) fn bracketed(raw: &str) -> &str {
    raw.split_whitespace()
        .find(|c| c.starts_with('[') && c.ends_with(']'))
        .map(|c| &c[1..c.len() - 1])
        .unwrap_or_else(|| raw.trim())
}

/// Write several sysfs paths as one unit.
///
/// On the first failure every path already written gets its previous value
/// back, so the tunable is either fully changed or untouched.
pub(crate) fn write_sysfs_all(
    sys: &dyn System,
    key: &TunableKey,
    writes: &[(String, String)],
) -> Result<()> {
    let mut done: Vec<(&str, String)> = Vec::with_capacity(writes.len());
    for (path, value) in writes {
        let previous = sys
            .read_sysfs(path)
            .map(|raw| bracketed(&raw).to_string())
            .map_err(|e| TuneError::apply(key, format!("{}: {}", path, e)))?;
        if let Err(e) = sys.write_sysfs(path, value) {
            for (written, old) in done.iter().rev() {
                if let Err(restore) = sys.write_sysfs(written, old) {
                    warn!("could not restore {} to '{}': {}", written, old, restore);
                }
            }
            return Err(TuneError::apply(key, format!("{}: {}", path, e)));
        }
        done.push((path.as_str(), previous));
    }
    Ok(())
}

/// Pick `value` when it is in `allowed`, else `fallback`.
pub(crate) fn allow_or<'a>(value: &'a str, allowed: &[&str], fallback: &'a str) -> &'a str {
    if allowed.contains(&value) {
        value
    } else {
        fallback
    }
}
