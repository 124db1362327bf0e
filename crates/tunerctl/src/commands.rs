//! Command handlers. Each returns the process exit code.

use anyhow::Result;
use std::io::Write;
use tracing::{info, warn};

use tuner_common::status::StatusReport;
use tuner_common::{ServiceArbiter, ServiceLock, System, TuneApp, TunerPaths};

use crate::cli::{Cli, Commands, NoteAction, RevertTarget, ServiceAction, StagingAction};
use crate::output;

/// Run one parsed command line against `sys`.
pub fn run(cli: &Cli, sys: &dyn System, out: &mut dyn Write) -> Result<i32> {
    let paths = TunerPaths::with_root(&cli.root);
    let mut app = TuneApp::new(sys, paths.clone())?;

    match &cli.command {
        Commands::Note { action } => note(action, cli.json, sys, &paths, &mut app, out),
        Commands::Revert { target: RevertTarget::All } => {
            let lock = ServiceLock::acquire(&paths, "revert all")?;
            app.revert_all(true, &lock)?;
            info!("all notes reverted");
            Ok(0)
        }
        Commands::Service { action } => service(*action, cli.json, sys, &paths, &mut app, out),
        Commands::Daemon { action } => {
            let forward = action.forward();
            warn!(
                "ATTENTION: the argument 'daemon' is deprecated! Forwarding to 'tunerctl service {}'.",
                forward_name(forward)
            );
            service(forward, cli.json, sys, &paths, &mut app, out)
        }
        Commands::Staging { action: StagingAction::List } => {
            let files = app.catalog().staged()?;
            output::print_staging(out, app.config.staging, &files)?;
            Ok(0)
        }
        Commands::Status => service(ServiceAction::Status, cli.json, sys, &paths, &mut app, out),
    }
}

fn forward_name(action: ServiceAction) -> &'static str {
    match action {
        ServiceAction::Takeover => "takeover",
        ServiceAction::Disablestop => "disablestop",
        _ => "status",
    }
}

fn note(
    action: &NoteAction,
    json: bool,
    sys: &dyn System,
    paths: &TunerPaths,
    app: &mut TuneApp<'_>,
    out: &mut dyn Write,
) -> Result<i32> {
    match action {
        NoteAction::List => {
            let notes = app.catalog().list()?;
            if json {
                output::print_json(out, &notes)?;
            } else {
                let applied = app.applied_notes()?;
                output::print_note_list(out, &notes, &app.config.notes, &applied)?;
            }
        }
        NoteAction::Enabled => output::print_enabled(out, &app.config.notes)?,
        NoteAction::Apply { id } => {
            ServiceArbiter::new(sys, paths, &app.config.services).ensure_no_competitor()?;
            let lock = ServiceLock::acquire(paths, "note apply")?;
            app.apply_note(id, &lock)?;
            info!("note {} applied", id);
        }
        NoteAction::Revert { id } => {
            let lock = ServiceLock::acquire(paths, "note revert")?;
            app.revert_note(id, &lock)?;
            info!("note {} reverted", id);
        }
        NoteAction::Simulate { id } => {
            let rows = app.simulate(id)?;
            if json {
                output::print_json(out, &rows)?;
            } else {
                output::print_simulation(out, id, &rows)?;
            }
        }
    }
    Ok(0)
}

fn service(
    action: ServiceAction,
    json: bool,
    sys: &dyn System,
    paths: &TunerPaths,
    app: &mut TuneApp<'_>,
    out: &mut dyn Write,
) -> Result<i32> {
    let services = app.config.services.clone();
    let arbiter = ServiceArbiter::new(sys, paths, &services);

    match action {
        ServiceAction::Apply => {
            arbiter.ensure_no_competitor()?;
            let lock = ServiceLock::acquire(paths, "service apply")?;
            info!("tuner is now tuning the system...");
            app.tune_all(&lock)?;
        }
        ServiceAction::Revert => {
            arbiter.ensure_revert_allowed()?;
            let lock = ServiceLock::acquire(paths, "service revert")?;
            if !app.config.note_apply_order.is_empty() {
                info!("tuner is now reverting all settings...");
            }
            app.revert_all(false, &lock)?;
        }
        ServiceAction::Reload => {
            info!("tuner is now reloading the tuning...");
            arbiter.ensure_revert_allowed()?;
            let lock = ServiceLock::acquire(paths, "service reload")?;
            app.revert_all(false, &lock)?;
            arbiter.ensure_no_competitor()?;
            app.tune_all(&lock)?;
        }
        ServiceAction::Start | ServiceAction::Enablestart => {
            let lock = ServiceLock::acquire(paths, "service start")?;
            arbiter.start(action == ServiceAction::Enablestart, lock)?;
            hint_untuned(app);
        }
        ServiceAction::Stop | ServiceAction::Disablestop => {
            let lock = ServiceLock::acquire(paths, "service stop")?;
            arbiter.stop(action == ServiceAction::Disablestop, lock)?;
        }
        ServiceAction::Restart => {
            let lock = ServiceLock::acquire(paths, "service restart")?;
            arbiter.restart(lock)?;
        }
        ServiceAction::Enable => arbiter.enable()?,
        ServiceAction::Disable => arbiter.disable()?,
        ServiceAction::Takeover => {
            let lock = ServiceLock::acquire(paths, "service takeover")?;
            arbiter.takeover(lock)?;
            hint_untuned(app);
        }
        ServiceAction::Status => {
            let report = StatusReport::collect(sys, app)?;
            if json {
                output::print_json(out, &report)?;
            } else {
                output::print_status(out, &report)?;
            }
            return Ok(report.exit_code());
        }
    }
    Ok(0)
}

fn hint_untuned(app: &TuneApp<'_>) {
    if app.config.notes.is_empty() {
        info!("Your system has not yet been tuned. Use 'tunerctl note apply' to start tuning.");
    }
}
