//! Text output. Everything goes to the writer handed in; logging goes to
//! stderr separately.

use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{self, Write};

use tuner_common::note::{NoteInfo, PreviewRow};
use tuner_common::status::StatusReport;
use tuner_common::system::service::UnitState;

const LABEL_WIDTH: usize = 24;

fn line(out: &mut dyn Write, label: &str, value: impl std::fmt::Display) -> io::Result<()> {
    writeln!(out, "{:<width$}{}", format!("{}:", label), value, width = LABEL_WIDTH)
}

fn unit_state(state: &UnitState) -> String {
    let text = state.format_human();
    if !state.available {
        text.dimmed().to_string()
    } else if state.running {
        text.green().to_string()
    } else {
        text.yellow().to_string()
    }
}

pub fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

pub fn print_status(out: &mut dyn Write, report: &StatusReport) -> io::Result<()> {
    writeln!(out)?;
    line(out, &report.own.unit, unit_state(&report.own))?;
    line(out, "tuner package", format!("'{}'", report.version))?;
    line(out, "configured Notes", report.configured_notes.join(" "))?;
    line(out, "order of enabled notes", report.apply_order.join(" "))?;
    line(out, "applied Notes", report.applied_notes.join(" "))?;
    line(
        out,
        "staging",
        if report.staging_enabled { "enabled" } else { "disabled" },
    )?;
    line(out, "staging area", report.staged.join(" "))?;
    writeln!(out)?;
    line(out, &report.competitor.unit, unit_state(&report.competitor))?;
    line(out, &report.helper.unit, unit_state(&report.helper))?;
    writeln!(out)?;

    if !report.own.enabled {
        let how = if report.stopped() { "enablestart" } else { "enable" };
        writeln!(
            out,
            "Remember: to activate the tuning after a reboot, run 'tunerctl service {}'.",
            how
        )?;
    }
    if report.not_tuned() {
        writeln!(
            out,
            "Your system has not yet been tuned. Use 'tunerctl note apply' to start tuning."
        )?;
    }
    if report.conflict() {
        writeln!(
            out,
            "{}",
            format!(
                "WARNING! {} and {} are BOTH enabled! Only one tool may tune the system.",
                report.own.unit, report.competitor.unit
            )
            .red()
        )?;
    }
    writeln!(out)
}

pub fn print_note_list(
    out: &mut dyn Write,
    notes: &[NoteInfo],
    enabled: &[String],
    applied: &[String],
) -> io::Result<()> {
    writeln!(out, "All notes (+ denotes manually enabled notes, * denotes applied notes, O denotes override file):")?;
    writeln!(out)?;
    for note in notes {
        let applied = applied.contains(&note.id);
        let mark = if applied {
            "*"
        } else if enabled.contains(&note.id) {
            "+"
        } else {
            " "
        };
        let ovw = if note.has_override { "O" } else { " " };
        let staged = if note.staged { " (staged)" } else { "" };
        let mut id = format!("{:<10}", note.id);
        if applied {
            id = id.green().to_string();
        }
        writeln!(out, " {}{} {}\t{}{}", mark, ovw, id, note.description, staged)?;
    }
    writeln!(out)
}

pub fn print_enabled(out: &mut dyn Write, notes: &[String]) -> io::Result<()> {
    writeln!(out, "{}", notes.join(" "))
}

pub fn print_simulation(out: &mut dyn Write, id: &str, rows: &[PreviewRow]) -> io::Result<()> {
    writeln!(out, "If you run 'tunerctl note apply {}', the following changes will be made:", id)?;
    writeln!(out)?;
    writeln!(out, "{:<40} | {:<24} | {:<24} | {}", "Parameter", "Current", "Desired", "Expected")?;
    writeln!(out, "{}", "-".repeat(110))?;
    for row in rows {
        let expected = match (&row.merged, &row.error) {
            (Some(merged), _) => merged.clone(),
            (None, Some(err)) => format!("{}", format!("error: {}", err).red()),
            (None, None) => String::new(),
        };
        writeln!(
            out,
            "{:<40} | {:<24} | {:<24} | {}",
            row.key,
            row.current.trim_end(),
            row.desired,
            expected.trim_end()
        )?;
    }
    writeln!(out)
}

pub fn print_staging(out: &mut dyn Write, enabled: bool, files: &[String]) -> io::Result<()> {
    line(out, "staging", if enabled { "enabled" } else { "disabled" })?;
    if files.is_empty() {
        writeln!(out, "The staging area is empty.")
    } else {
        for file in files {
            writeln!(out, "  {}", file)?;
        }
        Ok(())
    }
}
