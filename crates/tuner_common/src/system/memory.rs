//! In-memory [`System`] for tests.
//!
//! Interior mutability keeps the trait `&self`; the engine is single threaded.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use super::{System, UnitOperation};
use crate::error::{Result, TuneError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeUnit {
    pub enabled: bool,
    pub running: bool,
}

#[derive(Debug, Default)]
pub struct InMemorySystem {
    sysctl: RefCell<BTreeMap<String, String>>,
    sysfs: RefCell<BTreeMap<String, String>>,
    files: RefCell<BTreeMap<PathBuf, String>>,
    units: RefCell<BTreeMap<String, FakeUnit>>,
    packages: BTreeMap<String, String>,
    cmdline: String,
    main_memory_mb: u64,
    total_memory_mb: u64,
    shm_size_mb: RefCell<Option<u64>>,
    competitor_marker: RefCell<bool>,
    failing: RefCell<BTreeSet<String>>,
    failing_units: RefCell<BTreeSet<String>>,
    journal: RefCell<Vec<String>>,
    observer: Option<UnitObserver>,
}

/// Callback run with each journal entry as the unit operation happens
struct UnitObserver(Box<dyn Fn(&str)>);

impl fmt::Debug for UnitObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UnitObserver")
    }
}

impl InMemorySystem {
    pub fn new() -> Self {
        Self {
            main_memory_mb: 16384,
            total_memory_mb: 18432,
            ..Default::default()
        }
    }

    pub fn with_memory(mut self, main_mb: u64, total_mb: u64) -> Self {
        self.main_memory_mb = main_mb;
        self.total_memory_mb = total_mb;
        self
    }

    pub fn with_sysctl(self, name: &str, value: &str) -> Self {
        self.sysctl.borrow_mut().insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_sysfs(self, rel: &str, value: &str) -> Self {
        self.sysfs.borrow_mut().insert(rel.to_string(), value.to_string());
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .borrow_mut()
            .insert(PathBuf::from(path), content.to_string());
        self
    }

    pub fn with_unit(self, unit: &str, enabled: bool, running: bool) -> Self {
        self.units
            .borrow_mut()
            .insert(unit.to_string(), FakeUnit { enabled, running });
        self
    }

    pub fn with_package(mut self, package: &str, version: &str) -> Self {
        self.packages.insert(package.to_string(), version.to_string());
        self
    }

    pub fn with_cmdline(mut self, cmdline: &str) -> Self {
        self.cmdline = cmdline.to_string();
        self
    }

    pub fn with_shm(self, size_mb: u64) -> Self {
        *self.shm_size_mb.borrow_mut() = Some(size_mb);
        self
    }

    /// Leave a competitor "active" marker even when its unit is stopped.
    pub fn with_competitor_marker(self) -> Self {
        *self.competitor_marker.borrow_mut() = true;
        self
    }

    /// Call `observer` with every unit operation before it takes effect,
    /// so callers can look at their own state at that moment.
    pub fn with_unit_observer(mut self, observer: impl Fn(&str) + 'static) -> Self {
        self.observer = Some(UnitObserver(Box::new(observer)));
        self
    }

    /// Make every write to a sysctl/sysfs path or file fail.
    pub fn fail_writes_to(&self, target: &str) {
        self.failing.borrow_mut().insert(target.to_string());
    }

    pub fn heal_writes_to(&self, target: &str) {
        self.failing.borrow_mut().remove(target);
    }

    /// Make every operation on `unit` fail.
    pub fn fail_unit(&self, unit: &str) {
        self.failing_units.borrow_mut().insert(unit.to_string());
    }

    pub fn sysctl(&self, name: &str) -> Option<String> {
        self.sysctl.borrow().get(name).cloned()
    }

    pub fn sysfs(&self, rel: &str) -> Option<String> {
        self.sysfs.borrow().get(rel).cloned()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(Path::new(path)).cloned()
    }

    pub fn unit(&self, unit: &str) -> Option<FakeUnit> {
        self.units.borrow().get(unit).cloned()
    }

    pub fn shm(&self) -> Option<u64> {
        *self.shm_size_mb.borrow()
    }

    /// Unit operations in call order, e.g. `"stop sapconf.service"`.
    pub fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    fn check_writable(&self, target: &str) -> io::Result<()> {
        if self.failing.borrow().contains(target) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("write to {} refused", target),
            ));
        }
        Ok(())
    }
}

fn not_found(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", what))
}

impl System for InMemorySystem {
    fn read_sysctl(&self, name: &str) -> io::Result<String> {
        self.sysctl(name).ok_or_else(|| not_found(name))
    }

    fn write_sysctl(&self, name: &str, value: &str) -> io::Result<()> {
        self.check_writable(name)?;
        let mut sysctl = self.sysctl.borrow_mut();
        let slot = sysctl.get_mut(name).ok_or_else(|| not_found(name))?;
        *slot = value.to_string();
        Ok(())
    }

    fn read_sysfs(&self, rel: &str) -> io::Result<String> {
        self.sysfs(rel).ok_or_else(|| not_found(rel))
    }

    fn write_sysfs(&self, rel: &str, value: &str) -> io::Result<()> {
        self.check_writable(rel)?;
        let mut sysfs = self.sysfs.borrow_mut();
        let slot = sysfs.get_mut(rel).ok_or_else(|| not_found(rel))?;
        // sysfs selectors ("[mq-deadline] none") read back with the choice bracketed
        if slot.contains('[') {
            let choices: Vec<String> = slot
                .split_whitespace()
                .map(|c| c.trim_matches(|ch| ch == '[' || ch == ']').to_string())
                .collect();
            if !choices.iter().any(|c| c == value) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' not offered by {}", value, rel),
                ));
            }
            *slot = choices
                .iter()
                .map(|c| if c == value { format!("[{}]", c) } else { c.clone() })
                .collect::<Vec<_>>()
                .join(" ");
        } else {
            *slot = value.to_string();
        }
        Ok(())
    }

    fn list_sysfs(&self, rel: &str) -> Vec<String> {
        let prefix = format!("{}/", rel.trim_end_matches('/'));
        let names: BTreeSet<String> = self
            .sysfs
            .borrow()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(|s| s.to_string())
            .collect();
        names.into_iter().collect()
    }

    fn main_memory_mb(&self) -> u64 {
        self.main_memory_mb
    }

    fn total_memory_mb(&self) -> u64 {
        self.total_memory_mb
    }

    fn shm_size_mb(&self) -> Option<u64> {
        self.shm()
    }

    fn resize_shm(&self, size_mb: u64) -> io::Result<()> {
        self.check_writable("/dev/shm")?;
        let mut shm = self.shm_size_mb.borrow_mut();
        match shm.as_mut() {
            Some(size) => {
                *size = size_mb;
                Ok(())
            }
            None => Err(not_found("/dev/shm")),
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<Option<String>> {
        Ok(self.files.borrow().get(path).cloned())
    }

    fn write_file(&self, path: &Path, content: Option<&str>) -> io::Result<()> {
        self.check_writable(&path.to_string_lossy())?;
        let mut files = self.files.borrow_mut();
        match content {
            Some(content) => {
                files.insert(path.to_path_buf(), content.to_string());
            }
            None => {
                files.remove(path);
            }
        }
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Vec<String> {
        self.files
            .borrow()
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect()
    }

    fn kernel_cmdline(&self) -> String {
        self.cmdline.clone()
    }

    fn package_version(&self, package: &str) -> Option<String> {
        self.packages.get(package).cloned()
    }

    fn unit_operation(&self, op: UnitOperation, unit: &str) -> Result<()> {
        let entry = format!("{} {}", op.as_str(), unit);
        if let Some(UnitObserver(observe)) = &self.observer {
            observe(&entry);
        }
        self.journal.borrow_mut().push(entry);

        if self.failing_units.borrow().contains(unit) {
            return Err(TuneError::service(
                unit,
                format!("systemctl {} failed: refused", op.as_str()),
            ));
        }
        let mut units = self.units.borrow_mut();
        let state = units
            .get_mut(unit)
            .ok_or_else(|| TuneError::service(unit, "unit not found"))?;
        match op {
            UnitOperation::Enable => state.enabled = true,
            UnitOperation::Disable => state.enabled = false,
            UnitOperation::Start | UnitOperation::Restart => state.running = true,
            UnitOperation::Stop => state.running = false,
        }
        Ok(())
    }

    fn unit_is_running(&self, unit: &str) -> bool {
        self.unit(unit).map(|u| u.running).unwrap_or(false)
    }

    fn unit_is_enabled(&self, unit: &str) -> bool {
        self.unit(unit).map(|u| u.enabled).unwrap_or(false)
    }

    fn unit_is_available(&self, unit: &str) -> bool {
        self.units.borrow().contains_key(unit)
    }

    fn competitor_active(&self, unit: &str) -> bool {
        *self.competitor_marker.borrow() || self.unit_is_running(unit) || self.unit_is_enabled(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_write_moves_brackets() {
        let sys = InMemorySystem::new().with_sysfs("block/sda/queue/scheduler", "[mq-deadline] none");
        sys.write_sysfs("block/sda/queue/scheduler", "none").unwrap();
        assert_eq!(
            sys.sysfs("block/sda/queue/scheduler").as_deref(),
            Some("mq-deadline [none]")
        );
        assert!(sys.write_sysfs("block/sda/queue/scheduler", "bfq").is_err());
    }

    #[test]
    fn test_list_sysfs_children() {
        let sys = InMemorySystem::new()
            .with_sysfs("block/sdb/queue/nr_requests", "64")
            .with_sysfs("block/sda/queue/nr_requests", "128")
            .with_sysfs("block/sda/queue/scheduler", "none");
        assert_eq!(sys.list_sysfs("block"), vec!["sda", "sdb"]);
    }

    #[test]
    fn test_unit_operations_are_journaled() {
        let sys = InMemorySystem::new().with_unit("tuned.service", true, true);
        sys.unit_operation(UnitOperation::Disable, "tuned.service").unwrap();
        sys.unit_operation(UnitOperation::Stop, "tuned.service").unwrap();
        assert_eq!(sys.journal(), vec!["disable tuned.service", "stop tuned.service"]);
        assert_eq!(sys.unit("tuned.service"), Some(FakeUnit::default()));
    }
}
