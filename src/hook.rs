use std::{collections::BTreeSet, sync::Arc};

use log::Level;

use crate::{error::Error, formatter::Formatter, log_file::LogWriter, record::Record};

/// Every level, most severe first.
pub const ALL_LEVELS: [Level; 5] = [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace];

/// A record sink attached to a logger.
pub trait Hook: Send + Sync {
    /// Levels this hook is fired for.
    fn levels(&self) -> &[Level];
    fn fire(&self, record: &Record) -> Result<(), Error>;
}

/// Writes the records carrying at least one of its selector fields to a single destination.
///
/// A hook built without selectors writes every record.
pub struct WriterHook {
    formatter: Box<dyn Formatter>,
    writer: Arc<dyn LogWriter>,
    selectors: BTreeSet<String>,
}

impl WriterHook {
    pub fn new<F, I, S>(formatter: F, writer: Arc<dyn LogWriter>, selectors: I) -> Self
    where
        F: Formatter + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            formatter: Box::new(formatter),
            writer,
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn selects(&self, record: &Record) -> bool {
        self.selectors.is_empty() || record.fields.keys().any(|key| self.selectors.contains(key))
    }
}

impl Hook for WriterHook {
    fn levels(&self) -> &[Level] {
        &ALL_LEVELS
    }

    fn fire(&self, record: &Record) -> Result<(), Error> {
        if !self.selects(record) {
            return Ok(());
        }
        let bytes = self.formatter.format(record)?;
        self.writer.write_record(&bytes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{formatter::TextFormatter, record::Fields};
    use std::sync::Mutex;

    /// In-memory destination for hook and logger tests.
    #[derive(Default)]
    pub(crate) struct MemoryWriter(pub Mutex<Vec<String>>);

    impl LogWriter for MemoryWriter {
        fn write_record(&self, bytes: &[u8]) -> Result<(), Error> {
            self.0
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(bytes).into_owned());
            Ok(())
        }
    }

    struct FailingWriter;

    impl LogWriter for FailingWriter {
        fn write_record(&self, _: &[u8]) -> Result<(), Error> {
            Err(Error::Write {
                path: "/dev/full".into(),
                source: std::io::Error::other("no space left"),
            })
        }
    }

    fn record_with(keys: &[&str]) -> Record {
        let fields = keys
            .iter()
            .map(|key| (key.to_string(), "x".into()))
            .collect::<Fields>();
        Record::new(Level::Info, "message", fields)
    }

    #[test]
    fn test_any_selector_matches() {
        let writer = Arc::new(MemoryWriter::default());
        let hook = WriterHook::new(TextFormatter::default(), writer.clone(), ["stage", "query", "query_result"]);
        hook.fire(&record_with(&["stage"])).unwrap();
        hook.fire(&record_with(&["query_result", "other"])).unwrap();
        hook.fire(&record_with(&["task_ranking_results"])).unwrap();
        hook.fire(&record_with(&[])).unwrap();
        let lines = writer.0.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("stage=x"));
        assert!(lines[1].contains("query_result=x"));
    }

    #[test]
    fn test_empty_selectors_write_everything() {
        let writer = Arc::new(MemoryWriter::default());
        let hook = WriterHook::new(TextFormatter::default(), writer.clone(), Vec::<String>::new());
        hook.fire(&record_with(&[])).unwrap();
        hook.fire(&record_with(&["anything"])).unwrap();
        assert_eq!(writer.0.lock().unwrap().len(), 2);
        assert_eq!(hook.levels(), &ALL_LEVELS);
    }

    #[test]
    fn test_write_failure_is_returned() {
        let hook = WriterHook::new(TextFormatter::default(), Arc::new(FailingWriter), ["stage"]);
        assert!(matches!(hook.fire(&record_with(&["stage"])), Err(Error::Write { .. })));
        // Unselected records never reach the writer.
        assert!(hook.fire(&record_with(&["query_results"])).is_ok());
    }
}
