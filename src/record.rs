use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use log::Level;
use serde_json::Value;

/// Structured fields attached to a record, sorted by key.
pub type Fields = BTreeMap<String, Value>;

/// Key holding the record timestamp in formatted output.
pub const TIME_KEY: &str = "time";
/// Key holding the record level in formatted output.
pub const LEVEL_KEY: &str = "level";
/// Key holding the record message in formatted output.
pub const MESSAGE_KEY: &str = "msg";

/// A single log entry, produced at the call site and handed to every hook.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
            fields,
        }
    }

    /// RFC 3339 timestamp in UTC with fixed nanosecond precision, e.g. `2024-05-01T10:00:00.120000000Z`.
    ///
    /// Trailing zeros are kept and no local offset is used, unlike Go's `time.RFC3339Nano`.
    pub fn timestamp(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// User fields with names clashing with `time`, `level` or `msg` moved to `fields.<name>`.
    pub fn output_fields(&self) -> Fields {
        self.fields
            .iter()
            .map(|(key, value)| {
                let key = match key.as_str() {
                    TIME_KEY | LEVEL_KEY | MESSAGE_KEY => format!("fields.{key}"),
                    _ => key.clone(),
                };
                (key, value.clone())
            })
            .collect()
    }
}

pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "error",
        Level::Warn => "warning",
        Level::Info => "info",
        Level::Debug => "debug",
        Level::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_has_nanoseconds() {
        let mut record = Record::new(Level::Info, "hello", Fields::new());
        record.time = Utc.timestamp_opt(1_714_557_600, 1_000).unwrap();
        assert_eq!(record.timestamp(), "2024-05-01T10:00:00.000001000Z");
    }

    #[test]
    fn test_clashing_fields_are_renamed() {
        let fields = Fields::from([
            ("msg".to_string(), Value::from("user message")),
            ("level".to_string(), Value::from(3)),
            ("stage".to_string(), Value::from("rank")),
        ]);
        let output = Record::new(Level::Warn, "hello", fields).output_fields();
        assert_eq!(output["fields.msg"], "user message");
        assert_eq!(output["fields.level"], 3);
        assert_eq!(output["stage"], "rank");
        assert!(!output.contains_key("msg"));
    }
}
