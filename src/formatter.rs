use std::fmt::Write;

use colored::Colorize;
use log::Level;
use serde_json::{Map, Value};

use crate::{
    error::Error,
    record::{LEVEL_KEY, MESSAGE_KEY, Record, TIME_KEY, level_name},
};

/// Turns a record into the bytes written by a hook, newline included.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &Record) -> Result<Vec<u8>, Error>;
}

/// `key=value` line formatter with a full timestamp.
///
/// Timestamps always carry nine fractional digits and a `Z` suffix, see [`Record::timestamp`];
/// trailing zeros are not trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter {
    /// Colors the level with ANSI escapes. Keep disabled for files.
    pub colors: bool,
}

impl TextFormatter {
    pub fn colored() -> Self {
        Self { colors: true }
    }

    fn level(&self, level: Level) -> String {
        let name = level_name(level);
        if !self.colors {
            return name.to_string();
        }
        let name = match level {
            Level::Error => name.red(),
            Level::Warn => name.yellow(),
            Level::Info => name.green(),
            Level::Debug => name.blue(),
            Level::Trace => name.purple(),
        };
        name.to_string()
    }
}

fn needs_quoting(text: &str) -> bool {
    !text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+'))
}

fn write_value(line: &mut String, text: &str) {
    if needs_quoting(text) {
        // A JSON string literal is a valid escaped, double-quoted value.
        line.push_str(&Value::from(text).to_string());
    } else {
        line.push_str(text);
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &Record) -> Result<Vec<u8>, Error> {
        let mut line = String::new();
        line.push_str(TIME_KEY);
        line.push('=');
        write_value(&mut line, &record.timestamp());
        let _ = write!(line, " {LEVEL_KEY}={}", self.level(record.level));
        let _ = write!(line, " {MESSAGE_KEY}=");
        write_value(&mut line, &record.message);
        for (key, value) in record.output_fields() {
            line.push(' ');
            write_value(&mut line, &key);
            line.push('=');
            match value {
                Value::String(text) => write_value(&mut line, &text),
                other => write_value(&mut line, &other.to_string()),
            }
        }
        line.push('\n');
        Ok(line.into_bytes())
    }
}

/// One JSON object per line. Characters like `<`, `>` and `&` are written as is.
///
/// `time` uses the fixed nine-digit UTC form of [`Record::timestamp`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record) -> Result<Vec<u8>, Error> {
        let mut object: Map<String, Value> = record.output_fields().into_iter().collect();
        object.insert(TIME_KEY.into(), record.timestamp().into());
        object.insert(LEVEL_KEY.into(), level_name(record.level).into());
        object.insert(MESSAGE_KEY.into(), record.message.clone().into());
        let mut bytes = serde_json::to_vec(&object)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Fields;
    use chrono::{TimeZone, Utc};

    fn record(level: Level, message: &str, fields: &[(&str, Value)]) -> Record {
        let fields = fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<Fields>();
        let mut record = Record::new(level, message, fields);
        record.time = Utc.timestamp_opt(1_714_557_600, 123_456_789).unwrap();
        record
    }

    #[test]
    fn test_text_line() {
        let record = record(
            Level::Info,
            "ranking tasks",
            &[("stage", "rank".into()), ("query", "cpu_usage{job=\"x\"}".into()), ("count", 3.into())],
        );
        let line = String::from_utf8(TextFormatter::default().format(&record).unwrap()).unwrap();
        assert_eq!(
            line,
            "time=\"2024-05-01T10:00:00.123456789Z\" level=info msg=\"ranking tasks\" \
             count=3 query=\"cpu_usage{job=\\\"x\\\"}\" stage=rank\n"
        );
    }

    #[test]
    fn test_text_quotes_awkward_keys() {
        let record = record(Level::Info, "ranked", &[("task id", "a".into()), ("k=v\nnext", 1.into())]);
        let line = String::from_utf8(TextFormatter::default().format(&record).unwrap()).unwrap();
        assert!(line.ends_with(" \"k=v\\nnext\"=1 \"task id\"=a\n"), "{line}");
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_text_warning_level_and_bare_message() {
        let record = record(Level::Warn, "slow", &[]);
        let line = String::from_utf8(TextFormatter::default().format(&record).unwrap()).unwrap();
        assert!(line.contains(" level=warning msg=slow\n"));
    }

    #[test]
    fn test_text_colors() {
        colored::control::set_override(true);
        let record = record(Level::Error, "boom", &[]);
        let colored = String::from_utf8(TextFormatter::colored().format(&record).unwrap()).unwrap();
        assert!(colored.contains("\x1b["));
        let plain = String::from_utf8(TextFormatter::default().format(&record).unwrap()).unwrap();
        assert!(!plain.contains("\x1b["));
    }

    #[test]
    fn test_json_object() {
        let results = serde_json::json!([{"task": "a", "weight": 0.5}]);
        let record = record(
            Level::Info,
            "<ranked> & done",
            &[("task_ranking_results", results.clone()), ("time", "user".into())],
        );
        let bytes = JsonFormatter.format(&record).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("<ranked> & done"));
        let parsed: Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(parsed["task_ranking_results"], results);
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["msg"], "<ranked> & done");
        assert_eq!(parsed["time"], "2024-05-01T10:00:00.123456789Z");
        assert_eq!(parsed["fields.time"], "user");
    }
}
