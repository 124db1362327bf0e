//! tuner: applies and reverts vendor tuning recipes ("notes") on a running
//! Linux host and arbitrates tuning control against a competing daemon.
//!
//! Layers, bottom up:
//! - [`tunable`]: per-family read/merge/write handlers and their registry
//! - [`note`]: note definitions and the initialise/optimise/apply lifecycle
//! - [`saved_state`]: original values captured for revert
//! - [`lock`] and [`arbiter`]: exclusive tuning and service takeover
//! - [`app`]: enabled notes, apply order, tune-all and revert-all

pub mod app;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod lock;
pub mod note;
pub mod paths;
pub mod saved_state;
pub mod status;
pub mod sysconfig;
pub mod system;
pub mod tunable;

pub use app::TuneApp;
pub use arbiter::ServiceArbiter;
pub use config::{ServiceNames, TunerConfig};
pub use error::{KeyFailure, Result, TuneError};
pub use lock::{ServiceLock, TakeoverSignal};
pub use note::{Note, NoteLifecycle, NoteState};
pub use paths::TunerPaths;
pub use saved_state::SavedStateStore;
pub use system::{InMemorySystem, LinuxSystem, System};
pub use tunable::{Family, TunableContext, TunableKey};
