//! Installed package versions. Notes only state a minimum version; nothing
//! gets installed.

use super::{registry::Handler, TunableContext, TunableKey};
use crate::error::Result;
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

fn package(key: &TunableKey) -> &str {
    key.name.strip_prefix("rpm:").unwrap_or(&key.name)
}

pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    Ok(sys.package_version(package(key)).unwrap_or_default())
}

pub fn merge(_key: &TunableKey, _current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    Ok(desired.trim().to_string())
}

pub fn write(_sys: &dyn System, _key: &TunableKey, _value: &str, _ctx: &TunableContext) -> Result<()> {
    Ok(())
}
