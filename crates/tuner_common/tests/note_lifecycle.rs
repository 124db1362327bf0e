//! End-to-end note lifecycle against an in-memory system.
//!
//! Scenarios covered:
//! 1. Multi-family apply and revert restores every original value
//! 2. Applying twice keeps the first captured values
//! 3. Failed keys are reported together and never saved
//! 4. A failed restore stays in saved state until a later revert succeeds
//! 5. The state machine refuses out-of-order steps

use std::fs;
use tempfile::TempDir;

use tuner_common::note::NoteCatalog;
use tuner_common::tunable::limits::LIMITS_CONF;
use tuner_common::{
    InMemorySystem, NoteLifecycle, NoteState, SavedStateStore, ServiceLock, TuneApp, TuneError,
    TunerPaths,
};

// ============================================================================
// Fixtures
// ============================================================================

const HANA: &str = "# Linux settings for SAP HANA
[sysctl]
vm.swappiness = 10
kernel.shmmni = 32768

[block]
IO_SCHEDULER = bfq
NRREQ = 0

[limits]
LIMIT_ITEM = nofile
LIMIT_DOMAIN = @sapsys @dba
LIMIT_HARD = 32800
LIMIT_SOFT = 32800

[vm]
THP = never
";

const LIMITS_BEFORE: &str = "@sapsys hard nofile 1024\n";

fn setup() -> (TempDir, TunerPaths) {
    let temp = TempDir::new().unwrap();
    let paths = TunerPaths::with_root(temp.path());
    fs::create_dir_all(paths.notes_dir()).unwrap();
    fs::write(paths.notes_dir().join("2205917"), HANA).unwrap();
    (temp, paths)
}

fn system() -> InMemorySystem {
    InMemorySystem::new()
        .with_sysctl("vm.swappiness", "60")
        .with_sysctl("kernel.shmmni", "4096")
        .with_sysfs("block/sda/queue/scheduler", "[mq-deadline] bfq none")
        .with_sysfs("block/sda/queue/nr_requests", "64")
        .with_sysfs("kernel/mm/transparent_hugepage/enabled", "[always] madvise never")
        .with_file(LIMITS_CONF, LIMITS_BEFORE)
}

fn assert_untouched(sys: &InMemorySystem) {
    assert_eq!(sys.sysctl("vm.swappiness").as_deref(), Some("60"));
    assert_eq!(sys.sysctl("kernel.shmmni").as_deref(), Some("4096"));
    assert_eq!(
        sys.sysfs("block/sda/queue/scheduler").as_deref(),
        Some("[mq-deadline] bfq none")
    );
    assert_eq!(sys.sysfs("block/sda/queue/nr_requests").as_deref(), Some("64"));
    assert_eq!(
        sys.sysfs("kernel/mm/transparent_hugepage/enabled").as_deref(),
        Some("[always] madvise never")
    );
    assert_eq!(sys.file(LIMITS_CONF).as_deref(), Some(LIMITS_BEFORE));
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_apply_then_revert_restores_every_family() {
    let (_temp, paths) = setup();
    let sys = system();
    let lock = ServiceLock::acquire(&paths, "apply").unwrap();
    let mut app = TuneApp::new(&sys, paths.clone()).unwrap();

    app.apply_note("2205917", &lock).unwrap();
    assert_eq!(sys.sysctl("vm.swappiness").as_deref(), Some("10"));
    assert_eq!(
        sys.sysfs("block/sda/queue/scheduler").as_deref(),
        Some("mq-deadline [bfq] none")
    );
    assert_eq!(sys.sysfs("block/sda/queue/nr_requests").as_deref(), Some("128"));
    assert_eq!(
        sys.sysfs("kernel/mm/transparent_hugepage/enabled").as_deref(),
        Some("always madvise [never]")
    );
    let limits = sys.file(LIMITS_CONF).unwrap();
    assert!(limits.contains("@sapsys hard nofile 32800"), "{}", limits);
    assert!(limits.contains("@dba soft nofile 32800"), "{}", limits);

    let saved = SavedStateStore::new(&paths).load("2205917").unwrap().unwrap();
    assert_eq!(saved.entries.len(), 7);

    app.revert_note("2205917", &lock).unwrap();
    assert_untouched(&sys);
    assert!(SavedStateStore::new(&paths).load("2205917").unwrap().is_none());
}

#[test]
fn test_second_apply_keeps_first_capture() {
    let (_temp, paths) = setup();
    let sys = system();
    let lock = ServiceLock::acquire(&paths, "apply").unwrap();
    let mut app = TuneApp::new(&sys, paths.clone()).unwrap();

    app.apply_note("2205917", &lock).unwrap();
    let after_first = (
        sys.sysfs("block/sda/queue/nr_requests"),
        sys.sysctl("vm.swappiness"),
        sys.file(LIMITS_CONF),
    );
    assert_eq!(after_first.0.as_deref(), Some("128"));

    app.apply_note("2205917", &lock).unwrap();
    let after_second = (
        sys.sysfs("block/sda/queue/nr_requests"),
        sys.sysctl("vm.swappiness"),
        sys.file(LIMITS_CONF),
    );
    assert_eq!(after_second, after_first);
    assert_eq!(app.config.note_apply_order, vec!["2205917"]);

    let saved = SavedStateStore::new(&paths).load("2205917").unwrap().unwrap();
    assert_eq!(saved.entries.len(), 7);
    let swappiness = saved.entries.iter().find(|e| e.key.name == "vm.swappiness").unwrap();
    assert_eq!(swappiness.value, "60");

    app.revert_note("2205917", &lock).unwrap();
    assert_untouched(&sys);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_failed_keys_are_aggregated_and_not_saved() {
    let (_temp, paths) = setup();
    let sys = system();
    sys.fail_writes_to("vm.swappiness");
    sys.fail_writes_to("kernel/mm/transparent_hugepage/enabled");
    let lock = ServiceLock::acquire(&paths, "apply").unwrap();
    let mut app = TuneApp::new(&sys, paths.clone()).unwrap();

    let err = app.apply_note("2205917", &lock).unwrap_err();
    match &err {
        TuneError::NoteFailed { note, failures } => {
            assert_eq!(note, "2205917");
            let keys: Vec<String> = failures.iter().map(|f| f.key.to_string()).collect();
            assert_eq!(keys, vec!["sysctl:vm.swappiness", "vm:THP"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(sys.sysctl("kernel.shmmni").as_deref(), Some("32768"));
    assert!(app.config.is_applied("2205917"));

    let saved = SavedStateStore::new(&paths).load("2205917").unwrap().unwrap();
    assert_eq!(saved.entries.len(), 5);
    assert!(saved.entries.iter().all(|e| e.key.name != "vm.swappiness"));

    sys.heal_writes_to("vm.swappiness");
    sys.heal_writes_to("kernel/mm/transparent_hugepage/enabled");
    app.revert_note("2205917", &lock).unwrap();
    assert_untouched(&sys);
}

#[test]
fn test_failed_restore_is_retried() {
    let (_temp, paths) = setup();
    let sys = system();
    let lock = ServiceLock::acquire(&paths, "apply").unwrap();
    let mut app = TuneApp::new(&sys, paths.clone()).unwrap();
    app.apply_note("2205917", &lock).unwrap();

    sys.fail_writes_to("kernel.shmmni");
    assert!(matches!(
        app.revert_all(false, &lock),
        Err(TuneError::NoteFailed { .. })
    ));
    assert_eq!(sys.sysctl("vm.swappiness").as_deref(), Some("60"));
    let saved = SavedStateStore::new(&paths).load("2205917").unwrap().unwrap();
    assert_eq!(saved.entries.len(), 1);
    assert_eq!(saved.entries[0].key.name, "kernel.shmmni");

    sys.heal_writes_to("kernel.shmmni");
    app.revert_all(false, &lock).unwrap();
    assert_untouched(&sys);
    assert!(app.applied_notes().unwrap().is_empty());
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn test_note_walks_every_state_once() {
    let (_temp, paths) = setup();
    let sys = system();
    let store = SavedStateStore::new(&paths);
    let lock = ServiceLock::acquire(&paths, "apply").unwrap();

    let mut note = NoteCatalog::new(&paths, false).load("2205917").unwrap();
    assert_eq!(note.state(), NoteState::Uninitialised);
    assert!(matches!(
        note.apply(&sys, &store, &lock),
        Err(TuneError::InvalidTransition { .. })
    ));

    note.initialise(&sys).unwrap();
    let current: Vec<Option<&str>> = note.entries().iter().map(|e| e.current.as_deref()).collect();
    assert_eq!(current[0], Some("60"));
    assert!(note.initialise(&sys).is_err());

    note.optimise(&sys).unwrap();
    note.apply(&sys, &store, &lock).unwrap();
    assert_eq!(note.state(), NoteState::Applied);
    assert!(note.entries().iter().all(|e| e.merged.is_some()));

    note.revert(&sys, &store, &lock).unwrap();
    assert_eq!(note.state(), NoteState::Reverted);
    assert_untouched(&sys);
    assert!(matches!(
        note.revert(&sys, &store, &lock),
        Err(TuneError::InvalidTransition { .. })
    ));
}
