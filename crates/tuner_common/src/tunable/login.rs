//! systemd-logind limits, kept in a drop-in owned by tuner.

use std::path::PathBuf;

use super::{registry::Handler, TunableContext, TunableKey};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

pub const LOGIND_DROPIN_DIR: &str = "/etc/systemd/logind.conf.d";

const SUPPORTED: [&str; 1] = ["UserTasksMax"];

fn dropin(name: &str) -> PathBuf {
    PathBuf::from(LOGIND_DROPIN_DIR).join(format!("tuner-{}.conf", name))
}

/// "" when the drop-in does not exist or the key is unknown.
pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    if !SUPPORTED.contains(&key.name.as_str()) {
        return Ok(String::new());
    }
    let path = dropin(&key.name);
    let content = sys
        .read_file(&path)
        .map_err(|e| TuneError::apply(key, format!("{}: {}", path.display(), e)))?
        .unwrap_or_default();
    let prefix = format!("{}=", key.name);
    Ok(content
        .lines()
        .filter_map(|l| l.trim().strip_prefix(prefix.as_str()))
        .last()
        .unwrap_or("")
        .trim()
        .to_string())
}

pub fn merge(_key: &TunableKey, _current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    Ok(desired.trim().to_string())
}

/// An empty value removes the drop-in.
pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    if !SUPPORTED.contains(&key.name.as_str()) {
        return Ok(());
    }
    let path = dropin(&key.name);
    let content = (!value.is_empty()).then(|| format!("[Login]\n{}={}\n", key.name, value));
    sys.write_file(&path, content.as_deref())
        .map_err(|e| TuneError::apply(key, format!("{}: {}", path.display(), e)))
}
