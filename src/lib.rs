//! # task-ranker-logger
//! Structured logger for the task ranker.
//!
//! Configuring the logger creates two log files named after the configuration time:
//! - `task_ranker_logs_<unix nanos>.log` receives, as text, every record carrying
//!   a `stage`, `query` or `query_result` field.
//! - `task_ranking_results_<unix nanos>.log` receives, as one JSON object per line,
//!   every record carrying a `task_ranking_results` field.
//!
//! Records without any of these fields are not written anywhere.
//!
//! ## Usage
//! ```rust
//! use task_ranker_logger::logger_config;
//!
//! # fn main() -> Result<(), task_ranker_logger::Error> {
//! let folder = std::env::temp_dir();
//! let logger = logger_config().with_folder(&folder).configure()?;
//! logger.with_field("stage", "fetch").info("querying prometheus");
//! logger
//!     .with_field("task_ranking_results", [("task-a", 0.7), ("task-b", 0.3)])
//!     .info("ranked tasks");
//! logger.done()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Process-wide logger
//! The crate root mirrors the [`TaskLogger`] operations on a process-wide instance,
//! which is also installed as the [`log`] crate's logger. Key-values given to the
//! `log` macros become record fields.
//!
//! ```rust
//! use task_ranker_logger::logger_config;
//!
//! # fn main() -> Result<(), task_ranker_logger::Error> {
//! let _guard = logger_config()
//!     .with_folder(std::env::temp_dir())
//!     .init_global()?;
//! task_ranker_logger::with_field("query", "up").info("fetched");
//! log::info!(stage = "rank"; "ranking {} tasks", 3);
//! // guard closes the log files when dropped
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod formatter;
mod hook;
mod log_file;
mod logger;
mod record;

pub use config::LogEnvConfig;
pub use error::Error;
pub use formatter::{Formatter, JsonFormatter, TextFormatter};
pub use hook::{ALL_LEVELS, Hook, WriterHook};
pub use log_file::{LOG_FILE_PERMISSIONS, LogFile, LogKind, LogStdout, LogWriter, log_file_name};
pub use logger::{Entry, TaskLogger};
pub use record::{Fields, Record, level_name};

use chrono::{DateTime, Utc};
use log::{
    Level, LevelFilter, Log,
    kv::{self, Source, VisitSource},
};
use serde::Serialize;
use serde_json::Value;
use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

/// Fields routing a record to the task ranker log file.
pub const TASK_RANKER_SELECTORS: [&str; 3] = ["stage", "query", "query_result"];
/// Field routing a record to the task ranking results log file.
pub const RANKING_RESULTS_FIELD: &str = "task_ranking_results";

/// Process-wide logger behind the free functions of this crate and the `log` macros.
static GLOBAL_LOGGER: LazyLock<RwLock<TaskLogger>> = LazyLock::new(|| {
    // Another logger may already own the `log` facade; the free functions still work then.
    let _ = log::set_boxed_logger(Box::new(LogBridge));
    log::set_max_level(LevelFilter::Info);
    RwLock::new(TaskLogger::default())
});

/// Routes `log` records to the process-wide logger.
struct LogBridge;

impl Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        global().enabled(metadata.level())
    }

    fn log(&self, record: &log::Record) {
        let logger = global();
        if !logger.enabled(record.level()) {
            return;
        }
        let mut collector = FieldCollector::default();
        // A failing source only loses the remaining key-values.
        let _ = record.key_values().visit(&mut collector);
        logger.dispatch(&Record::new(
            record.level(),
            record.args().to_string(),
            collector.0,
        ));
    }

    fn flush(&self) {}
}

#[derive(Default)]
struct FieldCollector(Fields);

impl<'kvs> VisitSource<'kvs> for FieldCollector {
    fn visit_pair(&mut self, key: kv::Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        let value = if let Some(flag) = value.to_bool() {
            Value::Bool(flag)
        } else if let Some(n) = value.to_i64() {
            Value::from(n)
        } else if let Some(n) = value.to_u64() {
            Value::from(n)
        } else if let Some(n) = value.to_f64() {
            serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
        } else {
            Value::String(value.to_string())
        };
        self.0.insert(key.as_str().to_string(), value);
        Ok(())
    }
}

/// Guard closing the process-wide log files when dropped.
pub struct LoggerGuard {
    logger: TaskLogger,
}

impl LoggerGuard {
    /// Closes the log files now, returning the close errors dropping would discard.
    pub fn done(self) -> Result<(), Error> {
        self.logger.done()
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        if let Err(err) = self.logger.done() {
            eprintln!("Failed to close log files: {err}");
        }
    }
}

/// Builder for configuring the task ranker logger.
pub struct ConfigBuilder {
    folder: PathBuf,
    level: LevelFilter,
    stdout: bool,
    timestamp: Option<DateTime<Utc>>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            level: LevelFilter::Info,
            stdout: false,
            timestamp: None,
        }
    }
}

impl ConfigBuilder {
    /// Starts from the `TASK_RANKER_LOG_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        let config = LogEnvConfig::load()?;
        Ok(Self {
            folder: config.folder(),
            level: config.level()?,
            stdout: config.STDOUT,
            timestamp: None,
        })
    }

    /// Sets the directory receiving the log files.
    pub fn with_folder<P: AsRef<Path>>(self, folder: P) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            ..self
        }
    }
    /// Sets the minimum level.
    pub fn with_level(self, level: LevelFilter) -> Self {
        Self { level, ..self }
    }
    /// Dynamically set the stdout flag.
    pub fn with_stdout(self, yes: bool) -> Self {
        Self { stdout: yes, ..self }
    }
    /// Names the log files after `timestamp` instead of the current time.
    pub fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    /// Creates both log files and a logger routing records to them.
    ///
    /// The task ranker log file is created first; no hook is registered if either creation fails.
    pub fn configure(self) -> Result<TaskLogger, Error> {
        let now = self.timestamp.unwrap_or_else(Utc::now);
        let ranker_file = Arc::new(LogFile::create(&self.folder, LogKind::TaskRanker, now)?);
        let results_file = Arc::new(LogFile::create(&self.folder, LogKind::RankingResults, now)?);
        let output: Option<Box<dyn LogWriter>> = if self.stdout {
            Some(Box::new(LogStdout))
        } else {
            None
        };
        let logger = TaskLogger::from_parts(
            self.level,
            output,
            vec![Arc::clone(&ranker_file), Arc::clone(&results_file)],
        );
        logger.add_hook(WriterHook::new(TextFormatter::default(), ranker_file, TASK_RANKER_SELECTORS));
        logger.add_hook(WriterHook::new(JsonFormatter, results_file, [RANKING_RESULTS_FIELD]));
        Ok(logger)
    }

    /// Configures the logger and installs it process-wide.
    /// Returns a guard that closes the log files when dropped.
    #[must_use = "LoggerGuard closes the log files when dropped. Do \"let _guard = logger_config().init_global()?;\""]
    pub fn init_global(self) -> Result<LoggerGuard, Error> {
        let logger = self.configure()?;
        install(logger.clone());
        Ok(LoggerGuard { logger })
    }
}

/// Returns a default ConfigBuilder for configuring the logger.
pub fn logger_config() -> ConfigBuilder {
    ConfigBuilder::default()
}

fn install(logger: TaskLogger) {
    let mut global = GLOBAL_LOGGER.write().unwrap_or_else(PoisonError::into_inner);
    log::set_max_level(logger.level());
    *global = logger;
}

/// The process-wide logger.
pub fn global() -> TaskLogger {
    GLOBAL_LOGGER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Configures the process-wide logger from the environment.
pub fn configure() -> Result<(), Error> {
    let logger = ConfigBuilder::from_env()?.configure()?;
    install(logger);
    Ok(())
}

/// Closes the log files of the process-wide logger.
pub fn done() -> Result<(), Error> {
    global().done()
}

/// Starts a record on the process-wide logger with one field.
pub fn with_field<V: Serialize>(key: impl Into<String>, value: V) -> Entry {
    global().with_field(key, value)
}

/// Starts a record on the process-wide logger with several fields.
pub fn with_fields<I, K, V>(fields: I) -> Entry
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Serialize,
{
    global().with_fields(fields)
}

/// Logs at info level on the process-wide logger.
pub fn info(message: impl Display) {
    global().log(Level::Info, message);
}

/// Logs formatted arguments at info level on the process-wide logger.
pub fn infof(args: fmt::Arguments<'_>) {
    global().log(Level::Info, args);
}

/// Logs at warning level on the process-wide logger.
pub fn warn(message: impl Display) {
    global().log(Level::Warn, message);
}

/// Logs formatted arguments at warning level on the process-wide logger.
pub fn warnf(args: fmt::Arguments<'_>) {
    global().log(Level::Warn, args);
}

/// Logs at error level on the process-wide logger.
pub fn error(message: impl Display) {
    global().log(Level::Error, message);
}

/// Logs formatted arguments at error level on the process-wide logger.
pub fn errorf(args: fmt::Arguments<'_>) {
    global().log(Level::Error, args);
}
