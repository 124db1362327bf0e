//! Service manager operations on top of [`System`].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::System;
use crate::error::Result;

/// Operation on a systemd unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOperation {
    Enable,
    Disable,
    Start,
    Stop,
    Restart,
}

impl UnitOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOperation::Enable => "enable",
            UnitOperation::Disable => "disable",
            UnitOperation::Start => "start",
            UnitOperation::Stop => "stop",
            UnitOperation::Restart => "restart",
        }
    }
}

/// Enable, then start a unit.
pub fn enable_start(sys: &dyn System, unit: &str) -> Result<()> {
    sys.unit_operation(UnitOperation::Enable, unit)?;
    sys.unit_operation(UnitOperation::Start, unit)
}

/// Disable, then stop a unit.
pub fn disable_stop(sys: &dyn System, unit: &str) -> Result<()> {
    sys.unit_operation(UnitOperation::Disable, unit)?;
    sys.unit_operation(UnitOperation::Stop, unit)
}

/// Snapshot of a unit for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub unit: String,
    pub available: bool,
    pub enabled: bool,
    pub running: bool,
}

impl UnitState {
    pub fn query(sys: &dyn System, unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            available: sys.unit_is_available(unit),
            enabled: sys.unit_is_enabled(unit),
            running: sys.unit_is_running(unit),
        }
    }

    pub fn format_human(&self) -> String {
        if !self.available {
            return "not available".to_string();
        }
        format!(
            "{}/{}",
            if self.enabled { "enabled" } else { "disabled" },
            if self.running { "active" } else { "stopped" }
        )
    }
}

/// Disable and stop a unit, then report whether it really went away.
pub fn disable_stop_verified(sys: &dyn System, unit: &str) -> Result<()> {
    disable_stop(sys, unit)?;
    if sys.unit_is_running(unit) || sys.unit_is_enabled(unit) {
        warn!(
            "seems disabling and stopping service '{}' was not successful. Please check.",
            unit
        );
    } else {
        info!("Service '{}' disabled and stopped", unit);
    }
    Ok(())
}
