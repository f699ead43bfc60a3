use std::{
    fmt,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};

use crate::error::Error;

/// Permission bits of both log files: read and write for everyone.
pub const LOG_FILE_PERMISSIONS: u32 = 0o666;

/// Destination of formatted log records.
///
/// Implementations must write one record per call so concurrent records never interleave.
pub trait LogWriter: Send + Sync {
    fn write_record(&self, bytes: &[u8]) -> Result<(), Error>;
}

/// The two log files created by the task ranker logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Operational and query logs, text formatted.
    TaskRanker,
    /// Task ranking results, JSON formatted.
    RankingResults,
}

impl LogKind {
    pub fn prefix(self) -> &'static str {
        match self {
            LogKind::TaskRanker => "task_ranker_logs",
            LogKind::RankingResults => "task_ranking_results",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::TaskRanker => f.write_str("task ranker"),
            LogKind::RankingResults => f.write_str("task ranking results"),
        }
    }
}

/// Name of the log file of the given kind created at `now`, e.g. `task_ranker_logs_1714557600000000000.log`.
pub fn log_file_name(kind: LogKind, now: DateTime<Utc>) -> Result<String, Error> {
    let nanos = now.timestamp_nanos_opt().ok_or(Error::Timestamp(now))?;
    Ok(format!("{}_{nanos}.log", kind.prefix()))
}

/// A log file shared between the logger that owns it and the hook writing to it.
pub struct LogFile {
    kind: LogKind,
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    /// Creates the log file of the given kind in `folder`, named after `now`.
    pub fn create<P: AsRef<Path>>(folder: P, kind: LogKind, now: DateTime<Utc>) -> Result<Self, Error> {
        let path = folder.as_ref().join(log_file_name(kind, now)?);
        let mut options = File::options();
        options.create(true).truncate(false).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(LOG_FILE_PERMISSIONS);
        }
        match options.open(&path) {
            Ok(file) => Ok(Self {
                kind,
                path,
                file: Mutex::new(Some(file)),
            }),
            Err(source) => Err(Error::CreateFile { kind, path, source }),
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Syncs and releases the descriptor. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), Error> {
        let Some(file) = self.lock().take() else {
            return Ok(());
        };
        file.sync_all().map_err(|source| Error::CloseFile {
            kind: self.kind,
            source,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogWriter for LogFile {
    fn write_record(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut guard = self.lock();
        let result = match guard.as_mut() {
            Some(file) => file.write_all(bytes),
            None => Err(io::Error::other("log file already closed")),
        };
        result.map_err(|source| Error::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Base output echoing every record to stdout.
#[derive(Default, Debug)]
pub struct LogStdout;

impl LogWriter for LogStdout {
    fn write_record(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(bytes)
            .and_then(|()| stdout.flush())
            .map_err(|source| Error::Write {
                path: PathBuf::from("<stdout>"),
                source,
            })
    }
}
