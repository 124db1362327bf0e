//! Snapshot behind `service status`.

use serde::Serialize;

use crate::app::TuneApp;
use crate::error::Result;
use crate::system::service::UnitState;
use crate::system::System;

/// Exit code when our own service is not running
pub const EXIT_STOPPED: i32 = 1;
/// Exit code when no note is configured
pub const EXIT_NOT_TUNED: i32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub own: UnitState,
    pub competitor: UnitState,
    pub helper: UnitState,
    pub version: String,
    pub configured_notes: Vec<String>,
    pub apply_order: Vec<String>,
    pub applied_notes: Vec<String>,
    pub staging_enabled: bool,
    pub staged: Vec<String>,
}

impl StatusReport {
    pub fn collect(sys: &dyn System, app: &TuneApp<'_>) -> Result<Self> {
        let services = &app.config.services;
        Ok(Self {
            own: UnitState::query(sys, &services.own),
            competitor: UnitState::query(sys, &services.competitor),
            helper: UnitState::query(sys, &services.helper),
            version: env!("CARGO_PKG_VERSION").to_string(),
            configured_notes: app.config.notes.clone(),
            apply_order: app.config.note_apply_order.clone(),
            applied_notes: app.applied_notes()?,
            staging_enabled: app.config.staging,
            staged: app.catalog().staged()?,
        })
    }

    pub fn stopped(&self) -> bool {
        !self.own.running
    }

    pub fn not_tuned(&self) -> bool {
        self.configured_notes.is_empty()
    }

    /// Both tuning services enabled at once
    pub fn conflict(&self) -> bool {
        self.own.enabled && self.competitor.enabled
    }

    /// Stopped takes precedence over not tuned.
    pub fn exit_code(&self) -> i32 {
        if self.stopped() {
            EXIT_STOPPED
        } else if self.not_tuned() {
            EXIT_NOT_TUNED
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::TunerPaths;
    use crate::system::InMemorySystem;
    use tempfile::TempDir;

    #[test]
    fn test_exit_code_order() {
        let temp = TempDir::new().unwrap();
        let paths = TunerPaths::with_root(temp.path());

        let stopped = InMemorySystem::new().with_unit("tuner.service", false, false);
        let app = TuneApp::new(&stopped, paths.clone()).unwrap();
        let report = StatusReport::collect(&stopped, &app).unwrap();
        assert!(report.not_tuned());
        assert_eq!(report.exit_code(), EXIT_STOPPED);

        let running = InMemorySystem::new()
            .with_unit("tuner.service", true, true)
            .with_unit("sapconf.service", true, false);
        let mut app = TuneApp::new(&running, paths).unwrap();
        let report = StatusReport::collect(&running, &app).unwrap();
        assert_eq!(report.exit_code(), EXIT_NOT_TUNED);
        assert!(report.conflict());
        assert!(!report.helper.available);

        app.config.enable_note("1557506");
        let report = StatusReport::collect(&running, &app).unwrap();
        assert_eq!(report.exit_code(), 0);
    }
}
