//! Service Lock Arbiter: hands control of system tuning between our own
//! service and the competing tuning daemon.
//!
//! Our service runs `service apply` on start and `service revert` on stop,
//! and both take the [`ServiceLock`]. Every operation here that makes the
//! service manager start or stop our service must therefore give the lock up
//! first, or the service would wait on the lock we hold.

use tracing::{info, warn};

use crate::config::ServiceNames;
use crate::error::{Result, TuneError};
use crate::lock::{ServiceLock, TakeoverSignal};
use crate::paths::TunerPaths;
use crate::system::service::{disable_stop_verified, enable_start};
use crate::system::{System, UnitOperation};

pub struct ServiceArbiter<'a> {
    sys: &'a dyn System,
    paths: &'a TunerPaths,
    services: &'a ServiceNames,
}

impl<'a> ServiceArbiter<'a> {
    pub fn new(sys: &'a dyn System, paths: &'a TunerPaths, services: &'a ServiceNames) -> Self {
        Self { sys, paths, services }
    }

    pub fn own(&self) -> &str {
        &self.services.own
    }

    /// Refuse to act while the competitor tunes the system.
    pub fn ensure_no_competitor(&self) -> Result<()> {
        if self.sys.competitor_active(&self.services.competitor) {
            return Err(TuneError::CompetitorActive(self.services.competitor.clone()));
        }
        Ok(())
    }

    /// Like [`ensure_no_competitor`](Self::ensure_no_competitor), but skipped
    /// while a takeover stops our own service.
    pub fn ensure_revert_allowed(&self) -> Result<()> {
        if TakeoverSignal::is_active(self.paths) {
            warn!("takeover in progress, skipping check for active {}", self.services.competitor);
            return Ok(());
        }
        self.ensure_no_competitor()
    }

    /// Make our service the one that tunes the system, whatever runs now.
    pub fn takeover(&self, lock: ServiceLock) -> Result<()> {
        let own = self.services.own.as_str();
        let competitor = self.services.competitor.as_str();
        let helper = self.services.helper.as_str();
        let mut lock = Some(lock);
        info!("Starting '{}', this may take some time...", own);

        if self.sys.unit_is_available(helper) {
            disable_stop_verified(self.sys, helper)?;
        }

        if self.sys.competitor_active(competitor) {
            if self.sys.unit_is_running(own) || self.sys.unit_is_enabled(own) {
                // our service reverts on stop and needs the lock for it
                drop(lock.take());
                let _signal = TakeoverSignal::raise(self.paths)?;
                self.sys.unit_operation(UnitOperation::Disable, own)?;
                self.sys.unit_operation(UnitOperation::Stop, own)?;
            }
            disable_stop_verified(self.sys, competitor)?;
        }

        drop(lock.take());

        enable_start(self.sys, own)?;
        if self.sys.unit_is_running(own) && self.sys.unit_is_enabled(own) {
            info!("Service '{}' has been enabled and started.", own);
        } else {
            warn!(
                "seems enabling and starting service '{}' was not successful. Please check.",
                own
            );
        }
        Ok(())
    }

    pub fn start(&self, enable: bool, lock: ServiceLock) -> Result<()> {
        let own = self.own();
        info!("Starting '{}', this may take some time...", own);
        self.ensure_no_competitor()?;
        drop(lock);
        if enable {
            enable_start(self.sys, own)?;
            info!("Service '{}' has been enabled and started.", own);
        } else {
            self.sys.unit_operation(UnitOperation::Start, own)?;
            info!("Service '{}' has been started.", own);
        }
        if !self.sys.unit_is_enabled(own) {
            info!(
                "Remember: to activate the tuning after a reboot, enable {} by running 'tunerctl service enable'",
                own
            );
        }
        Ok(())
    }

    pub fn stop(&self, disable: bool, lock: ServiceLock) -> Result<()> {
        let own = self.own();
        info!("Stopping '{}', this may take some time...", own);
        drop(lock);
        if disable {
            self.sys.unit_operation(UnitOperation::Disable, own)?;
            self.sys.unit_operation(UnitOperation::Stop, own)?;
            info!("Service '{}' has been disabled and stopped.", own);
        } else {
            self.sys.unit_operation(UnitOperation::Stop, own)?;
            info!("Service '{}' has been stopped.", own);
        }
        info!("All tuned parameters have been reverted to default.");
        Ok(())
    }

    pub fn restart(&self, lock: ServiceLock) -> Result<()> {
        let own = self.own();
        info!("Restarting '{}', this may take some time...", own);
        drop(lock);
        self.sys.unit_operation(UnitOperation::Restart, own)?;
        info!("Service '{}' has been restarted.", own);
        Ok(())
    }

    pub fn enable(&self) -> Result<()> {
        let own = self.own();
        self.ensure_no_competitor()?;
        self.sys.unit_operation(UnitOperation::Enable, own)?;
        info!("Service '{}' has been enabled.", own);
        if !self.sys.unit_is_running(own) {
            info!(
                "Service '{}' is not running. Use 'tunerctl service start' to start it and tune the system",
                own
            );
        }
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        let own = self.own();
        self.sys.unit_operation(UnitOperation::Disable, own)?;
        info!("Service '{}' has been disabled.", own);
        if self.sys.unit_is_running(own) {
            info!(
                "Service '{}' still running. Use 'tunerctl service stop' to stop it and revert the tuning",
                own
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::InMemorySystem;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TunerPaths, ServiceNames) {
        let temp = TempDir::new().unwrap();
        let paths = TunerPaths::with_root(temp.path());
        (temp, paths, ServiceNames::default())
    }

    #[test]
    fn test_takeover_without_competitor() {
        let (_temp, paths, names) = setup();
        let sys = InMemorySystem::new()
            .with_unit("tuner.service", false, false)
            .with_unit("sapconf.service", false, false);
        let lock = ServiceLock::acquire(&paths, "takeover").unwrap();
        ServiceArbiter::new(&sys, &paths, &names).takeover(lock).unwrap();

        assert_eq!(sys.journal(), vec!["enable tuner.service", "start tuner.service"]);
        assert!(!paths.lock_file().exists());
    }

    #[test]
    fn test_takeover_releases_lock_before_own_service_calls() {
        let (_temp, paths, names) = setup();
        let locked_calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&locked_calls);
        let lock_file = paths.lock_file();
        let sys = InMemorySystem::new()
            .with_unit("tuned.service", true, true)
            .with_unit("tuner.service", true, true)
            .with_unit("sapconf.service", true, true)
            .with_unit_observer(move |call| {
                if lock_file.exists() {
                    seen.borrow_mut().push(call.to_string());
                }
            });
        let lock = ServiceLock::acquire(&paths, "takeover").unwrap();
        ServiceArbiter::new(&sys, &paths, &names).takeover(lock).unwrap();

        assert_eq!(
            *locked_calls.borrow(),
            vec!["disable tuned.service", "stop tuned.service"]
        );
        assert_eq!(
            sys.journal(),
            vec![
                "disable tuned.service",
                "stop tuned.service",
                "disable tuner.service",
                "stop tuner.service",
                "disable sapconf.service",
                "stop sapconf.service",
                "enable tuner.service",
                "start tuner.service",
            ]
        );
    }

    #[test]
    fn test_service_manager_failure_is_fatal() {
        let (_temp, paths, names) = setup();
        let sys = InMemorySystem::new()
            .with_unit("tuner.service", false, false)
            .with_unit("sapconf.service", true, true);
        sys.fail_unit("sapconf.service");
        let lock = ServiceLock::acquire(&paths, "takeover").unwrap();
        let err = ServiceArbiter::new(&sys, &paths, &names)
            .takeover(lock)
            .unwrap_err();
        assert!(err.is_fatal(), "got {:?}", err);
        assert!(!sys.unit("tuner.service").unwrap().running);
    }

    #[test]
    fn test_start_refuses_active_competitor() {
        let (_temp, paths, names) = setup();
        let sys = InMemorySystem::new()
            .with_unit("tuner.service", false, false)
            .with_unit("sapconf.service", false, false)
            .with_competitor_marker();
        let lock = ServiceLock::acquire(&paths, "start").unwrap();
        let arbiter = ServiceArbiter::new(&sys, &paths, &names);
        let err = arbiter.start(true, lock).unwrap_err();
        assert!(matches!(err, TuneError::CompetitorActive(_)));
        assert!(sys.journal().is_empty());
        assert!(arbiter.enable().is_err());
    }

    #[test]
    fn test_revert_check_skipped_during_takeover() {
        let (_temp, paths, names) = setup();
        let sys = InMemorySystem::new().with_unit("sapconf.service", true, true);
        let arbiter = ServiceArbiter::new(&sys, &paths, &names);
        assert!(arbiter.ensure_revert_allowed().is_err());
        let _signal = TakeoverSignal::raise(&paths).unwrap();
        assert!(arbiter.ensure_revert_allowed().is_ok());
    }

    #[test]
    fn test_stop_and_disable() {
        let (_temp, paths, names) = setup();
        let sys = InMemorySystem::new().with_unit("tuner.service", true, true);
        let arbiter = ServiceArbiter::new(&sys, &paths, &names);
        arbiter
            .stop(true, ServiceLock::acquire(&paths, "stop").unwrap())
            .unwrap();
        assert_eq!(sys.unit("tuner.service").unwrap(), crate::system::memory::FakeUnit::default());
        arbiter.restart(ServiceLock::acquire(&paths, "restart").unwrap()).unwrap();
        assert!(sys.unit("tuner.service").unwrap().running);
        arbiter.disable().unwrap();
    }
}
