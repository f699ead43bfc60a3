use std::{io, path::PathBuf};

use chrono::{DateTime, Utc};

use crate::log_file::LogKind;

/// Errors returned while configuring, writing to or shutting down the logger.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create {kind} log file {}", path.display())]
    CreateFile {
        kind: LogKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to close {kind} log file")]
    CloseFile {
        kind: LogKind,
        #[source]
        source: io::Error,
    },
    #[error("failed to write log record to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to format log record as json")]
    Format(#[from] serde_json::Error),
    /// Every close failure from a single shutdown, in the order the files were closed.
    #[error("{} log files failed to close: {}", .0.len(), join(.0))]
    Shutdown(Vec<Error>),
    #[error("timestamp {0} cannot be expressed in unix nanoseconds")]
    Timestamp(DateTime<Utc>),
    #[error("invalid logger configuration: {0}")]
    Config(String),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Folds the errors collected during shutdown into a single result.
    pub(crate) fn from_shutdown(mut errors: Vec<Error>) -> Result<(), Error> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Shutdown(errors)),
        }
    }
}
