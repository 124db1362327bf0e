//! Live host implementation of [`System`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use sysinfo::System as SysInfo;
use tracing::debug;

use super::{System, UnitOperation};
use crate::error::{Result, TuneError};

/// Talks to the running Linux host.
///
/// All filesystem paths are resolved below `root`, which is `/` in
/// production and a scratch directory when testing against a fake tree.
#[derive(Debug, Clone)]
pub struct LinuxSystem {
    root: PathBuf,
}

impl LinuxSystem {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path.strip_prefix("/").unwrap_or(path))
    }

    fn sysctl_path(&self, name: &str) -> PathBuf {
        self.resolve(Path::new("/proc/sys")).join(name.replace('.', "/"))
    }

    fn sysfs_path(&self, rel: &str) -> PathBuf {
        self.resolve(Path::new("/sys")).join(rel)
    }

    fn systemctl(&self, args: &[&str]) -> io::Result<std::process::Output> {
        debug!("systemctl {}", args.join(" "));
        Command::new("systemctl").args(args).output()
    }

    fn memory() -> SysInfo {
        let mut info = SysInfo::new();
        info.refresh_memory();
        info
    }
}

fn read_trimmed(path: &Path) -> io::Result<String> {
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

fn sorted_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

const MB: u64 = 1024 * 1024;

impl System for LinuxSystem {
    fn read_sysctl(&self, name: &str) -> io::Result<String> {
        read_trimmed(&self.sysctl_path(name))
    }

    fn write_sysctl(&self, name: &str, value: &str) -> io::Result<()> {
        fs::write(self.sysctl_path(name), value)
    }

    fn read_sysfs(&self, rel: &str) -> io::Result<String> {
        read_trimmed(&self.sysfs_path(rel))
    }

    fn write_sysfs(&self, rel: &str, value: &str) -> io::Result<()> {
        fs::write(self.sysfs_path(rel), value)
    }

    fn list_sysfs(&self, rel: &str) -> Vec<String> {
        sorted_names(&self.sysfs_path(rel))
    }

    fn main_memory_mb(&self) -> u64 {
        Self::memory().total_memory() / MB
    }

    fn total_memory_mb(&self) -> u64 {
        let info = Self::memory();
        (info.total_memory() + info.total_swap()) / MB
    }

    fn shm_size_mb(&self) -> Option<u64> {
        let mounts = fs::read_to_string(self.resolve(Path::new("/proc/mounts"))).ok()?;
        let mounted = mounts
            .lines()
            .any(|l| l.split_whitespace().nth(1) == Some("/dev/shm"));
        if !mounted {
            return None;
        }
        let stat = nix::sys::statvfs::statvfs(&self.resolve(Path::new("/dev/shm"))).ok()?;
        Some(stat.blocks() as u64 * stat.fragment_size() as u64 / MB)
    }

    fn resize_shm(&self, size_mb: u64) -> io::Result<()> {
        let output = Command::new("mount")
            .args(["-o", &format!("remount,size={}m", size_mb), "/dev/shm"])
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(self.resolve(path)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_file(&self, path: &Path, content: Option<&str>) -> io::Result<()> {
        let target = self.resolve(path);
        match content {
            Some(content) => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(target, content)
            }
            None => match fs::remove_file(target) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        }
    }

    fn list_dir(&self, path: &Path) -> Vec<String> {
        sorted_names(&self.resolve(path))
    }

    fn kernel_cmdline(&self) -> String {
        read_trimmed(&self.resolve(Path::new("/proc/cmdline"))).unwrap_or_default()
    }

    fn package_version(&self, package: &str) -> Option<String> {
        let output = Command::new("rpm")
            .args(["-q", "--qf", "%{VERSION}-%{RELEASE}", package])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn unit_operation(&self, op: UnitOperation, unit: &str) -> Result<()> {
        let output = self
            .systemctl(&[op.as_str(), unit])
            .map_err(|e| TuneError::service(unit, format!("failed to execute systemctl {}: {}", op.as_str(), e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TuneError::service(
                unit,
                format!("systemctl {} failed: {}", op.as_str(), stderr.trim()),
            ));
        }
        Ok(())
    }

    fn unit_is_running(&self, unit: &str) -> bool {
        self.systemctl(&["is-active", unit])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn unit_is_enabled(&self, unit: &str) -> bool {
        self.systemctl(&["is-enabled", unit])
            .map(|o| String::from_utf8_lossy(&o.stdout).trim() == "enabled")
            .unwrap_or(false)
    }

    fn unit_is_available(&self, unit: &str) -> bool {
        self.systemctl(&["list-unit-files", "--no-legend", unit])
            .map(|o| !String::from_utf8_lossy(&o.stdout).trim().is_empty())
            .unwrap_or(false)
    }

    fn competitor_active(&self, unit: &str) -> bool {
        // a competitor that exited keeps a marker under /run while its tuning is in effect
        let name = unit.trim_end_matches(".service");
        let marker = self.resolve(Path::new("/run")).join(name).join("active");
        self.unit_is_running(unit) || self.unit_is_enabled(unit) || marker.exists()
    }
}
