//! Page cache limit (`vm.pagecache_limit_mb`, SUSE kernels).

use super::{allow_or, registry::Handler, TunableContext, TunableKey};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

pub const SYSCTL_LIMIT_MB: &str = "vm.pagecache_limit_mb";
pub const SYSCTL_IGNORE_DIRTY: &str = "vm.pagecache_limit_ignore_dirty";

/// Default limit for HANA systems: 2% of main memory.
pub fn default_limit_mb(main_memory_mb: u64) -> u64 {
    main_memory_mb * 2 / 100
}

fn sysctl(key: &TunableKey, sys: &dyn System, name: &str) -> Result<String> {
    sys.read_sysctl(name)
        .map_err(|e| TuneError::apply(key, format!("{}: {}", name, e)))
}

pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    match key.name.as_str() {
        "ENABLE_PAGECACHE_LIMIT" => {
            let limit = sysctl(key, sys, SYSCTL_LIMIT_MB)?;
            Ok(if limit.parse::<u64>().unwrap_or(0) > 0 { "yes" } else { "no" }.to_string())
        }
        "PAGECACHE_LIMIT_IGNORE_DIRTY" => sysctl(key, sys, SYSCTL_IGNORE_DIRTY),
        "OVERRIDE_PAGECACHE_LIMIT_MB" => sysctl(key, sys, SYSCTL_LIMIT_MB),
        _ => Ok(String::new()),
    }
}

/// The limit is `0` unless the limit is enabled; an explicit override wins
/// over the 2% default.
pub fn merge(key: &TunableKey, _current: &str, desired: &str, ctx: &TunableContext) -> Result<String> {
    let desired = desired.trim();
    match key.name.as_str() {
        "ENABLE_PAGECACHE_LIMIT" => Ok(allow_or(desired, &["yes", "no"], "no").to_string()),
        "PAGECACHE_LIMIT_IGNORE_DIRTY" => Ok(allow_or(desired, &["0", "1", "2"], "1").to_string()),
        "OVERRIDE_PAGECACHE_LIMIT_MB" => {
            if ctx.pagecache_enabled != Some(true) {
                return Ok("0".to_string());
            }
            let explicit = desired.parse::<u64>().unwrap_or(0);
            if explicit != 0 {
                return Ok(explicit.to_string());
            }
            if ctx.main_memory_mb == 0 {
                return Err(TuneError::merge(key, "main memory size unknown"));
            }
            Ok(default_limit_mb(ctx.main_memory_mb).to_string())
        }
        _ => Ok(desired.to_string()),
    }
}

/// The enable switch has no kernel knob of its own; the limit carries it.
pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    let target = match key.name.as_str() {
        "PAGECACHE_LIMIT_IGNORE_DIRTY" => SYSCTL_IGNORE_DIRTY,
        "OVERRIDE_PAGECACHE_LIMIT_MB" => SYSCTL_LIMIT_MB,
        _ => return Ok(()),
    };
    if value.is_empty() {
        return Ok(());
    }
    sys.write_sysctl(target, value)
        .map_err(|e| TuneError::apply(key, format!("{}: {}", target, e)))
}
