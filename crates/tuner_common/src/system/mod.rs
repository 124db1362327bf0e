//! Access to the live system.
//!
//! Every effect the tuning engine has on the host goes through [`System`]:
//! kernel parameters, sysfs knobs, config files, memory facts and the
//! service manager. [`LinuxSystem`] talks to the real host,
//! [`InMemorySystem`] keeps everything in memory for tests.

pub mod linux;
pub mod memory;
pub mod service;

use std::io;
use std::path::Path;

use crate::error::Result;

pub use linux::LinuxSystem;
pub use memory::InMemorySystem;
pub use service::UnitOperation;

pub trait System {
    /// Read a kernel parameter (`vm.swappiness`).
    fn read_sysctl(&self, name: &str) -> io::Result<String>;
    fn write_sysctl(&self, name: &str, value: &str) -> io::Result<()>;

    /// Read a file below `/sys` given its relative path (`block/sda/queue/scheduler`).
    fn read_sysfs(&self, rel: &str) -> io::Result<String>;
    fn write_sysfs(&self, rel: &str, value: &str) -> io::Result<()>;
    /// Sorted entry names of a directory below `/sys`; empty when missing.
    fn list_sysfs(&self, rel: &str) -> Vec<String>;

    /// Physical memory in MB.
    fn main_memory_mb(&self) -> u64;
    /// Physical memory plus swap in MB.
    fn total_memory_mb(&self) -> u64;

    /// Size of the `/dev/shm` tmpfs in MB, `None` when not mounted.
    fn shm_size_mb(&self) -> Option<u64>;
    fn resize_shm(&self, size_mb: u64) -> io::Result<()>;

    /// Content of a config file, `None` when it does not exist.
    fn read_file(&self, path: &Path) -> io::Result<Option<String>>;
    /// Replace a config file; `None` removes it.
    fn write_file(&self, path: &Path, content: Option<&str>) -> io::Result<()>;
    /// Sorted file names in a directory; empty when missing.
    fn list_dir(&self, path: &Path) -> Vec<String>;

    /// The kernel command line of the running boot.
    fn kernel_cmdline(&self) -> String;
    /// `VERSION-RELEASE` of an installed package.
    fn package_version(&self, package: &str) -> Option<String>;

    fn unit_operation(&self, op: UnitOperation, unit: &str) -> Result<()>;
    fn unit_is_running(&self, unit: &str) -> bool;
    fn unit_is_enabled(&self, unit: &str) -> bool;
    fn unit_is_available(&self, unit: &str) -> bool;

    /// Whether the competing tuning daemon currently controls the system.
    fn competitor_active(&self, unit: &str) -> bool;
}
