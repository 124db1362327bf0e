//! Activation state of helper services, `start` or `stop`.

use super::{allow_or, registry::Handler, TunableContext, TunableKey};
use crate::error::Result;
use crate::system::{System, UnitOperation};

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

/// Unit behind a note's service tunable; `None` for unknown names.
pub fn unit_name(name: &str) -> Option<&'static str> {
    match name {
        "UuiddSocket" => Some("uuidd.socket"),
        "Sysstat" => Some("sysstat"),
        _ => None,
    }
}

pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    Ok(match unit_name(&key.name) {
        Some(unit) if sys.unit_is_running(unit) => "start".to_string(),
        Some(_) => "stop".to_string(),
        None => String::new(),
    })
}

/// uuidd must always run; other services follow the note.
pub fn merge(key: &TunableKey, _current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    Ok(match key.name.as_str() {
        "UuiddSocket" => "start".to_string(),
        name if unit_name(name).is_some() => allow_or(desired.trim(), &["start", "stop"], "start").to_string(),
        _ => String::new(),
    })
}

pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    let Some(unit) = unit_name(&key.name) else {
        return Ok(());
    };
    match value {
        "start" if !sys.unit_is_running(unit) => sys.unit_operation(UnitOperation::Start, unit),
        "stop" if sys.unit_is_running(unit) => sys.unit_operation(UnitOperation::Stop, unit),
        _ => Ok(()),
    }
}
