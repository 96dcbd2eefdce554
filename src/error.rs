use std::path::PathBuf;

use thiserror::Error;

/// Every failure the attendance core can hand back to a caller.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A submission for this batch and date is already in the log.
    #[error("Attendance for {batch} on {date} already exists.")]
    Conflict { batch: String, date: String },

    #[error("no students found for batch {0:?}")]
    NoRoster(String),

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read {}: {message}", path.display())]
    MalformedStore { path: PathBuf, message: String },
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CoreError::MalformedStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Stable code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidDate(_) => "invalid_date",
            CoreError::Conflict { .. } => "conflict",
            CoreError::NoRoster(_) => "no_roster",
            CoreError::InvalidSubmission(_) => "bad_params",
            CoreError::Io { .. } => "io_failed",
            CoreError::MalformedStore { .. } => "malformed_store",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
