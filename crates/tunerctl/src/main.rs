//! tunerctl - apply and revert vendor tuning notes.

use clap::Parser;
use std::io;
use std::process;

use tuner_common::{LinuxSystem, TuneError};
use tunerctl::cli::Cli;
use tunerctl::{commands, logging};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let sys = LinuxSystem::with_root(&cli.root);
    let stdout = io::stdout();
    let code = match commands::run(&cli, &sys, &mut stdout.lock()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            e.downcast_ref::<TuneError>()
                .map(TuneError::exit_code)
                .unwrap_or(1)
        }
    };
    process::exit(code);
}
