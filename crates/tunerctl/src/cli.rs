//! Command line surface.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tunerctl")]
#[command(about = "Apply and revert vendor tuning notes", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Treat DIR as the filesystem root (testing)
    #[arg(long, global = true, value_name = "DIR", default_value = "/")]
    pub root: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print status, note lists and simulations as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Work with single notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Revert tuning
    Revert {
        #[command(subcommand)]
        target: RevertTarget,
    },

    /// Control the tuner service
    Service {
        #[arg(value_enum)]
        action: ServiceAction,
    },

    /// Deprecated, forwards to `service`
    Daemon {
        #[arg(value_enum)]
        action: DaemonAction,
    },

    /// Staged note definitions
    Staging {
        #[command(subcommand)]
        action: StagingAction,
    },

    /// Same as `service status`
    Status,
}

#[derive(Subcommand, Debug)]
pub enum NoteAction {
    /// All available notes
    List,
    /// Enabled notes in apply order
    Enabled,
    /// Enable and apply a note
    Apply { id: String },
    /// Revert a note and disable it
    Revert { id: String },
    /// Show what apply would change, without changing it
    Simulate { id: String },
}

#[derive(Subcommand, Debug)]
pub enum RevertTarget {
    /// Revert every applied note and disable them all
    All,
}

#[derive(Subcommand, Debug)]
pub enum StagingAction {
    /// List files in the staging area
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceAction {
    Apply,
    Revert,
    Reload,
    Start,
    Stop,
    Enable,
    Disable,
    Enablestart,
    Disablestop,
    Restart,
    Takeover,
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DaemonAction {
    Start,
    Stop,
    Status,
}

impl DaemonAction {
    /// Service action the deprecated daemon action stands for
    pub fn forward(self) -> ServiceAction {
        match self {
            DaemonAction::Start => ServiceAction::Takeover,
            DaemonAction::Stop => ServiceAction::Disablestop,
            DaemonAction::Status => ServiceAction::Status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_service_and_globals() {
        let cli = Cli::try_parse_from(["tunerctl", "service", "takeover", "--root", "/tmp/r", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.root, PathBuf::from("/tmp/r"));
        assert!(matches!(
            cli.command,
            Commands::Service {
                action: ServiceAction::Takeover
            }
        ));
        assert!(Cli::try_parse_from(["tunerctl", "service", "bogus"]).is_err());
    }

    #[test]
    fn test_daemon_forwarding() {
        assert_eq!(DaemonAction::Start.forward(), ServiceAction::Takeover);
        assert_eq!(DaemonAction::Stop.forward(), ServiceAction::Disablestop);
        assert_eq!(DaemonAction::Status.forward(), ServiceAction::Status);
    }
}
