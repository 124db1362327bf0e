//! Error types for tuner.

use std::fmt;

use thiserror::Error;

use crate::tunable::TunableKey;

/// One failed tunable inside a note apply or revert.
#[derive(Debug, Clone)]
pub struct KeyFailure {
    pub key: TunableKey,
    pub cause: String,
}

impl fmt::Display for KeyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.cause)
    }
}

fn join_failures(failures: &[KeyFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum TuneError {
    #[error("parse error for {key}: {detail}")]
    Parse { key: String, detail: String },

    #[error("merge error for {key}: {detail}")]
    Merge { key: String, detail: String },

    #[error("apply error for {key}: {detail}")]
    Apply { key: String, detail: String },

    #[error("service '{service}': {detail}")]
    Service { service: String, detail: String },

    #[error("lock error: {0}")]
    Lock(String),

    #[error("note '{note}' cannot go from {from} to {to}")]
    InvalidTransition {
        note: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("note '{0}' not found")]
    NoteNotFound(String),

    #[error("ATTENTION: found an active {0}, so refuse any action")]
    CompetitorActive(String),

    #[error("note '{note}' failed for {} tunable(s): {}", .failures.len(), join_failures(.failures))]
    NoteFailed {
        note: String,
        failures: Vec<KeyFailure>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Toml(String),
}

impl TuneError {
    pub fn parse(key: impl ToString, detail: impl Into<String>) -> Self {
        TuneError::Parse {
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    pub fn merge(key: impl ToString, detail: impl Into<String>) -> Self {
        TuneError::Merge {
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    pub fn apply(key: impl ToString, detail: impl Into<String>) -> Self {
        TuneError::Apply {
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    pub fn service(service: &str, detail: impl Into<String>) -> Self {
        TuneError::Service {
            service: service.to_string(),
            detail: detail.into(),
        }
    }

    /// Process exit code used by the command line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            TuneError::Parse { .. } | TuneError::Merge { .. } => 2,
            TuneError::Lock(_) => 4,
            TuneError::NoteNotFound(_) => 5,
            _ => 1,
        }
    }

    /// Whether the takeover protocol must stop on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TuneError::Service { .. } | TuneError::Lock(_))
    }
}

impl From<toml::de::Error> for TuneError {
    fn from(e: toml::de::Error) -> Self {
        TuneError::Toml(e.to_string())
    }
}

impl From<toml::ser::Error> for TuneError {
    fn from(e: toml::ser::Error) -> Self {
        TuneError::Toml(e.to_string())
    }
}

pub type Result<T, E = TuneError> = std::result::Result<T, E>;
