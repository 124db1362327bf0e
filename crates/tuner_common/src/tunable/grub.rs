//! Boot command line parameters. These can only be verified at runtime;
//! changing them needs the boot loader configuration and a reboot.

use tracing::debug;

use super::{registry::Handler, TunableContext, TunableKey};
use crate::error::Result;
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

/// Value of a parameter that is not on the command line.
pub const NOT_SET: &str = "NA";

fn param(key: &TunableKey) -> &str {
    key.name.strip_prefix("grub:").unwrap_or(&key.name)
}

/// `param=value` yields `value`, a bare flag yields the flag itself.
pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    let name = param(key);
    let cmdline = sys.kernel_cmdline();
    let value = cmdline
        .split_whitespace()
        .filter_map(|tok| match tok.split_once('=') {
            Some((k, v)) if k == name => Some(v),
            None if tok == name => Some(tok),
            _ => None,
        })
        .last()
        .unwrap_or(NOT_SET);
    Ok(value.to_string())
}

pub fn merge(_key: &TunableKey, _current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    Ok(desired.trim().to_string())
}

pub fn write(_sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    debug!("{} = {} must be set on the boot loader command line", param(key), value);
    Ok(())
}
