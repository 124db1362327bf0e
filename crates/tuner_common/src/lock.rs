//! Service lock and takeover signal.
//!
//! `ServiceLock` makes tuning exclusive on this host. It is an advisory
//! `flock` on the lock file, so the kernel drops it when the holder dies and
//! a leftover file with stale or partial contents never blocks anyone. It
//! never waits: a lock held elsewhere is an error. The lock is released on
//! drop, so giving it up early is a plain `drop(lock)`.
//!
//! `TakeoverSignal` tells our own service, while the arbiter stops it, that
//! it must not refuse to revert because of the competitor. It is owned by one
//! arbitration step and removed when that step's guard goes away.

use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, warn};

use crate::error::{Result, TuneError};
use crate::paths::TunerPaths;

/// Attempts before giving up on a lock file that keeps being replaced
const ACQUIRE_ATTEMPTS: usize = 5;

/// Lock file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process holding the lock
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    /// Action that took the lock, for diagnostics
    pub action: String,
}

impl LockInfo {
    fn new(action: &str) -> Self {
        Self {
            pid: process::id(),
            acquired_at: Utc::now(),
            action: action.to_string(),
        }
    }
}

fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

/// Exclusive tuning lock; released on drop
#[derive(Debug)]
pub struct ServiceLock {
    path: PathBuf,
    _flock: Flock<File>,
}

impl ServiceLock {
    pub fn acquire(paths: &TunerPaths, action: &str) -> Result<Self> {
        let path = paths.lock_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        for _ in 0..ACQUIRE_ATTEMPTS {
            let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
            let mut file = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(f) => f,
                Err((_, Errno::EWOULDBLOCK)) => return Err(held_error(paths)),
                Err((_, errno)) => return Err(io::Error::from(errno).into()),
            };
            // a releasing holder unlinks the file before unlocking it, so
            // the inode we locked may no longer be the one at `path`
            if !still_linked(&path, &file)? {
                debug!("lock file {} was replaced, retrying", path.display());
                continue;
            }

            let info = LockInfo::new(action);
            file.set_len(0)?;
            file.write_all(serde_json::to_string_pretty(&info)?.as_bytes())?;
            file.sync_all()?;
            debug!("lock acquired: pid={} action={}", info.pid, action);
            return Ok(Self { path, _flock: file });
        }
        Err(TuneError::Lock(format!(
            "{} keeps being replaced by other processes",
            path.display()
        )))
    }

    /// Last holder recorded in the lock file, if any
    pub fn holder(paths: &TunerPaths) -> Option<LockInfo> {
        let content = fs::read_to_string(paths.lock_file()).ok()?;
        serde_json::from_str(&content).ok()
    }
}

fn still_linked(path: &Path, file: &File) -> Result<bool> {
    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn held_error(paths: &TunerPaths) -> TuneError {
    match ServiceLock::holder(paths) {
        Some(holder) => TuneError::Lock(format!(
            "held by pid {} since {} ({})",
            holder.pid,
            holder.acquired_at.format("%Y-%m-%d %H:%M:%S"),
            holder.action
        )),
        None => TuneError::Lock(format!(
            "{} is held by another process",
            paths.lock_file().display()
        )),
    }
}

impl Drop for ServiceLock {
    fn drop(&mut self) {
        // unlink while still locked; the flock goes with `_flock`
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("lock released"),
            Err(e) => warn!("could not remove lock file {}: {}", self.path.display(), e),
        }
    }
}

/// Marker raised while the arbiter stops our own service during a takeover
#[derive(Debug)]
pub struct TakeoverSignal {
    path: PathBuf,
}

impl TakeoverSignal {
    pub fn raise(paths: &TunerPaths) -> Result<Self> {
        let path = paths.takeover_marker();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, process::id().to_string())?;
        debug!("takeover signal raised");
        Ok(Self { path })
    }

    /// True only while the process that raised the marker is still alive.
    pub fn is_active(paths: &TunerPaths) -> bool {
        fs::read_to_string(paths.takeover_marker())
            .ok()
            .and_then(|c| c.trim().parse::<u32>().ok())
            .map(process_exists)
            .unwrap_or(false)
    }
}

impl Drop for TakeoverSignal {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("could not remove takeover signal {}: {}", self.path.display(), e);
        }
    }
}
