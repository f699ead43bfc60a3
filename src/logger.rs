use std::{
    fmt::{self, Display},
    sync::{Arc, PoisonError, RwLock},
};

use log::{Level, LevelFilter};
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::Error,
    formatter::{Formatter, TextFormatter},
    hook::Hook,
    log_file::{LogFile, LogWriter},
    record::{Fields, Record},
};

struct LoggerInner {
    level: LevelFilter,
    /// Base output; records are discarded here when unset.
    output: Option<Box<dyn LogWriter>>,
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
    /// Files owned by this logger, closed by [`TaskLogger::done`] in this order.
    files: Vec<Arc<LogFile>>,
}

/// Logger context owning its level, hooks and log files.
///
/// Clones share the same state, so a clone can be handed to any thread.
#[derive(Clone)]
pub struct TaskLogger {
    inner: Arc<LoggerInner>,
}

impl Default for TaskLogger {
    fn default() -> Self {
        Self::new(LevelFilter::Info)
    }
}

impl TaskLogger {
    /// A logger without output, hooks or files.
    pub fn new(level: LevelFilter) -> Self {
        Self::from_parts(level, None, Vec::new())
    }

    pub(crate) fn from_parts(
        level: LevelFilter,
        output: Option<Box<dyn LogWriter>>,
        files: Vec<Arc<LogFile>>,
    ) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                level,
                output,
                hooks: RwLock::new(Vec::new()),
                files,
            }),
        }
    }

    pub fn level(&self) -> LevelFilter {
        self.inner.level
    }

    pub fn add_hook<H: Hook + 'static>(&self, hook: H) {
        self.inner
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    pub fn files(&self) -> &[Arc<LogFile>] {
        &self.inner.files
    }

    /// Closes every log file owned by this logger.
    ///
    /// All files are closed even if one fails; the returned error lists each failure.
    pub fn done(&self) -> Result<(), Error> {
        let errors = self
            .inner
            .files
            .iter()
            .filter_map(|file| file.close().err())
            .collect();
        Error::from_shutdown(errors)
    }

    pub fn with_field<V: Serialize>(&self, key: impl Into<String>, value: V) -> Entry {
        Entry::new(self.clone()).with_field(key, value)
    }

    pub fn with_fields<I, K, V>(&self, fields: I) -> Entry
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        Entry::new(self.clone()).with_fields(fields)
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.inner.level
    }

    /// Hands the record to the base output and to every hook registered for its level.
    ///
    /// Failures are reported on stderr and never reach the caller.
    pub fn dispatch(&self, record: &Record) {
        if !self.enabled(record.level) {
            return;
        }
        if let Some(output) = &self.inner.output {
            let written = TextFormatter::colored()
                .format(record)
                .and_then(|bytes| output.write_record(&bytes));
            if let Err(err) = written {
                eprintln!("Failed to write to log output: {err}");
            }
        }
        let hooks = self.inner.hooks.read().unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter().filter(|hook| hook.levels().contains(&record.level)) {
            if let Err(err) = hook.fire(record) {
                eprintln!("Failed to fire hook: {err}");
            }
        }
    }

    pub fn log(&self, level: Level, message: impl Display) {
        Entry::new(self.clone()).log(level, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message);
    }

    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }

    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// Record builder accumulating fields before emission.
#[derive(Clone)]
pub struct Entry {
    logger: TaskLogger,
    fields: Fields,
}

impl Entry {
    pub fn new(logger: TaskLogger) -> Self {
        Self {
            logger,
            fields: Fields::new(),
        }
    }

    /// Adds a field, replacing any previous value under the same key.
    pub fn with_field<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.fields.insert(key, value);
            }
            // The key stays so the record is still routed; the value explains the failure.
            Err(err) => {
                self.fields
                    .insert(key, Value::String(format!("can not serialize: {err}")));
            }
        }
        self
    }

    pub fn with_fields<I, K, V>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        fields
            .into_iter()
            .fold(self, |entry, (key, value)| entry.with_field(key, value))
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn log(&self, level: Level, message: impl Display) {
        if !self.logger.enabled(level) {
            return;
        }
        let record = Record::new(level, message.to_string(), self.fields.clone());
        self.logger.dispatch(&record);
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message);
    }

    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }

    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}
