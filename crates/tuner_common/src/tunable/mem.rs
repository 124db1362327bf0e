//! `/dev/shm` sizing as a percentage of total memory.
//!
//! `VSZ_TMPFS_PERCENT` carries the percentage, `ShmFileSystemSizeMB` the
//! resulting size. `-1` means `/dev/shm` is not mounted.

use super::{registry::Handler, TunableContext, TunableKey};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

pub const DEFAULT_TMPFS_PERCENT: u64 = 75;

const UNAVAILABLE: &str = "-1";

pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    let size = sys.shm_size_mb();
    Ok(match (key.name.as_str(), size) {
        (_, None) if is_known(key) => UNAVAILABLE.to_string(),
        ("ShmFileSystemSizeMB", Some(mb)) => mb.to_string(),
        ("VSZ_TMPFS_PERCENT", Some(mb)) => match sys.total_memory_mb() {
            0 => UNAVAILABLE.to_string(),
            total => (mb * 100 / total).to_string(),
        },
        _ => String::new(),
    })
}

fn is_known(key: &TunableKey) -> bool {
    matches!(key.name.as_str(), "VSZ_TMPFS_PERCENT" | "ShmFileSystemSizeMB")
}

/// Percentage in 1..=100, `DEFAULT_TMPFS_PERCENT` when unset or `0`.
pub fn tmpfs_percent(key: &TunableKey, desired: &str) -> Result<u64> {
    match desired.trim() {
        "" | "0" => Ok(DEFAULT_TMPFS_PERCENT),
        raw => match raw.parse::<u64>() {
            Ok(p) if p <= 100 => Ok(p),
            _ => Err(TuneError::merge(key, format!("'{}' is no percentage", raw))),
        },
    }
}

pub fn merge(key: &TunableKey, current: &str, desired: &str, ctx: &TunableContext) -> Result<String> {
    match key.name.as_str() {
        "VSZ_TMPFS_PERCENT" => Ok(tmpfs_percent(key, desired)?.to_string()),
        "ShmFileSystemSizeMB" => {
            if current.trim() == UNAVAILABLE {
                return Ok(UNAVAILABLE.to_string());
            }
            let explicit: u64 = match desired.trim() {
                "" => 0,
                raw => raw
                    .parse()
                    .map_err(|_| TuneError::parse(key, format!("size '{}' is not a number", raw)))?,
            };
            if explicit != 0 {
                return Ok(explicit.to_string());
            }
            if ctx.total_memory_mb == 0 {
                return Err(TuneError::merge(key, "total memory size unknown"));
            }
            let percent = ctx.tmpfs_percent.unwrap_or(DEFAULT_TMPFS_PERCENT);
            Ok((ctx.total_memory_mb * percent / 100).to_string())
        }
        _ => Ok(String::new()),
    }
}

/// Only the size is written; the percentage just feeds the size calculation.
pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    if key.name != "ShmFileSystemSizeMB" || value.is_empty() || value == UNAVAILABLE {
        return Ok(());
    }
    let mb: u64 = value
        .parse()
        .map_err(|_| TuneError::parse(key, format!("size '{}' is not a number", value)))?;
    sys.resize_shm(mb)
        .map_err(|e| TuneError::apply(key, format!("/dev/shm: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::InMemorySystem;
    use crate::tunable::Family;

    const TOTAL: u64 = 20480;

    fn ctx(percent: u64) -> TunableContext {
        TunableContext {
            total_memory_mb: TOTAL,
            tmpfs_percent: Some(tmpfs_percent(&size_key(), &percent.to_string()).unwrap()),
            ..Default::default()
        }
    }

    fn size_key() -> TunableKey {
        TunableKey::new(Family::Mem, "ShmFileSystemSizeMB")
    }

    fn pct_key() -> TunableKey {
        TunableKey::new(Family::Mem, "VSZ_TMPFS_PERCENT")
    }

    #[test]
    fn test_percent_merge() {
        assert_eq!(merge(&pct_key(), "47", "80", &ctx(80)).unwrap(), "80");
        assert_eq!(merge(&pct_key(), "-1", "75", &ctx(75)).unwrap(), "75");
        assert_eq!(merge(&pct_key(), "47", "", &ctx(0)).unwrap(), "75");
        assert!(merge(&pct_key(), "47", "120", &ctx(0)).is_err());
    }

    #[test]
    fn test_size_from_percent() {
        assert_eq!(
            merge(&size_key(), "16043", "0", &ctx(80)).unwrap(),
            (TOTAL * 80 / 100).to_string()
        );
        assert_eq!(
            merge(&size_key(), "16043", "0", &ctx(0)).unwrap(),
            (TOTAL * 75 / 100).to_string()
        );
    }

    #[test]
    fn test_override_and_unavailable() {
        assert_eq!(merge(&size_key(), "16043", "25605", &ctx(80)).unwrap(), "25605");
        assert_eq!(merge(&size_key(), "-1", "25605", &ctx(80)).unwrap(), "-1");
        assert_eq!(merge(&size_key(), "-1", "0", &ctx(0)).unwrap(), "-1");
    }

    #[test]
    fn test_unknown_key_is_empty() {
        let key = TunableKey::new(Family::Mem, "UNKOWN_PARAMETER");
        assert_eq!(merge(&key, "16043", "0", &ctx(0)).unwrap(), "");
        let sys = InMemorySystem::new().with_shm(8192);
        assert_eq!(read(&sys, &key, &TunableContext::default()).unwrap(), "");
    }

    #[test]
    fn test_read_and_resize() {
        let sys = InMemorySystem::new().with_memory(16384, 16384).with_shm(8192);
        let ctx = TunableContext::default();
        assert_eq!(read(&sys, &size_key(), &ctx).unwrap(), "8192");
        assert_eq!(read(&sys, &pct_key(), &ctx).unwrap(), "50");
        write(&sys, &size_key(), "12288", &ctx).unwrap();
        assert_eq!(sys.shm(), Some(12288));

        let no_shm = InMemorySystem::new();
        assert_eq!(read(&no_shm, &size_key(), &ctx).unwrap(), "-1");
        write(&no_shm, &size_key(), "-1", &ctx).unwrap();
    }
}
