use crate::entry::EntryCaller;
use crate::env::{
    env_or, LOG_SINK_LEVEL_ENV, LOG_SINK_LOGSTORE_ENV, LOG_SINK_PROJECT_ENV, LOG_SINK_SOURCE_ENV,
    LOG_SINK_TOPIC_ENV,
};
use crate::error::{Error, Result};
use crate::level::Level;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

pub type LevelFormatter = Arc<dyn Fn(Level) -> String + Send + Sync>;
pub type TimeFormatter = Arc<dyn Fn(DateTime<Utc>) -> String + Send + Sync>;
pub type DurationFormatter = Arc<dyn Fn(chrono::Duration) -> String + Send + Sync>;
pub type CallerFormatter = Arc<dyn Fn(&EntryCaller) -> String + Send + Sync>;
pub type NameFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Key names and formatters applied when an entry is finalized.
///
/// If any key is empty, that portion of the entry is omitted. A formatter
/// left unset falls back to the default rendering for its concept; callers
/// have no default formatter, so the caller key is only written when one is
/// configured.
///
/// The configuration is immutable once built and is shared by `Arc` between
/// every encoder cloned from the same root.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncoderConfig {
    pub message_key: String,
    pub level_key: String,
    pub time_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub function_key: String,
    pub stacktrace_key: String,
    #[serde(skip)]
    pub encode_level: Option<LevelFormatter>,
    #[serde(skip)]
    pub encode_time: Option<TimeFormatter>,
    #[serde(skip)]
    pub encode_duration: Option<DurationFormatter>,
    #[serde(skip)]
    pub encode_caller: Option<CallerFormatter>,
    #[serde(skip)]
    pub encode_name: Option<NameFormatter>,
}

impl EncoderConfig {
    /// Keys commonly used by production JSON loggers.
    pub fn production() -> Self {
        EncoderConfig {
            message_key: "msg".to_string(),
            level_key: "level".to_string(),
            time_key: "ts".to_string(),
            name_key: "logger".to_string(),
            caller_key: "caller".to_string(),
            function_key: String::new(),
            stacktrace_key: "stacktrace".to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_level_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(Level) -> String + Send + Sync + 'static,
    {
        self.encode_level = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_time_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> String + Send + Sync + 'static,
    {
        self.encode_time = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_duration_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(chrono::Duration) -> String + Send + Sync + 'static,
    {
        self.encode_duration = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_caller_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&EntryCaller) -> String + Send + Sync + 'static,
    {
        self.encode_caller = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_name_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.encode_name = Some(Arc::new(f));
        self
    }

    /// Level rendering: configured formatter, else the canonical name.
    pub fn format_level(&self, level: Level) -> String {
        match &self.encode_level {
            Some(f) => f(level),
            None => level.as_str().to_string(),
        }
    }

    /// Time rendering: configured formatter, else RFC 3339 with second precision.
    pub fn format_time(&self, time: DateTime<Utc>) -> String {
        match &self.encode_time {
            Some(f) => f(time),
            None => time.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl fmt::Debug for EncoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderConfig")
            .field("message_key", &self.message_key)
            .field("level_key", &self.level_key)
            .field("time_key", &self.time_key)
            .field("name_key", &self.name_key)
            .field("caller_key", &self.caller_key)
            .field("function_key", &self.function_key)
            .field("stacktrace_key", &self.stacktrace_key)
            .field("encode_level", &self.encode_level.is_some())
            .field("encode_time", &self.encode_time.is_some())
            .field("encode_duration", &self.encode_duration.is_some())
            .field("encode_caller", &self.encode_caller.is_some())
            .field("encode_name", &self.encode_name.is_some())
            .finish()
    }
}

/// `INFO`, `WARN`, ...
pub fn capital_level(level: Level) -> String {
    level.capital_str().to_string()
}

/// RFC 3339 with nanosecond precision, e.g. `2024-05-01T10:00:00.123456789Z`.
pub fn rfc3339_nano_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn epoch_millis_time(time: DateTime<Utc>) -> String {
    time.timestamp_millis().to_string()
}

/// Human readable duration such as `1.5s` or `250ms`.
pub fn string_duration(d: chrono::Duration) -> String {
    let nanos = match d.num_nanoseconds() {
        Some(n) => n,
        None => return format!("{}s", d.num_seconds()),
    };
    let abs = nanos.unsigned_abs();
    let sign = if nanos < 0 { "-" } else { "" };
    let (value, unit) = if abs >= 1_000_000_000 {
        (abs as f64 / 1e9, "s")
    } else if abs >= 1_000_000 {
        (abs as f64 / 1e6, "ms")
    } else if abs >= 1_000 {
        (abs as f64 / 1e3, "µs")
    } else {
        (abs as f64, "ns")
    };
    format!("{}{}{}", sign, value, unit)
}

/// Floating-point seconds.
pub fn seconds_duration(d: chrono::Duration) -> String {
    match d.num_nanoseconds() {
        Some(n) => (n as f64 / 1e9).to_string(),
        None => d.num_seconds().to_string(),
    }
}

pub fn short_caller(caller: &EntryCaller) -> String {
    caller.short()
}

pub fn full_caller(caller: &EntryCaller) -> String {
    caller.full()
}

/// Destination identifiers and the minimum enabled level of a core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub project: String,
    pub logstore: String,
    pub topic: String,
    pub source: String,
    pub min_level: Level,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        ProducerConfig {
            project: String::new(),
            logstore: String::new(),
            topic: String::new(),
            source: String::new(),
            min_level: Level::Info,
        }
    }
}

impl ProducerConfig {
    pub fn new(project: impl Into<String>, logstore: impl Into<String>) -> Self {
        ProducerConfig {
            project: project.into(),
            logstore: logstore.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Read destination and level from the `LOG_SINK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let min_level = env_or(LOG_SINK_LEVEL_ENV, "info")
            .parse::<Level>()
            .map_err(|msg| Error::config(LOG_SINK_LEVEL_ENV, msg))?;

        Ok(ProducerConfig {
            project: env_or(LOG_SINK_PROJECT_ENV, ""),
            logstore: env_or(LOG_SINK_LOGSTORE_ENV, ""),
            topic: env_or(LOG_SINK_TOPIC_ENV, ""),
            source: env_or(LOG_SINK_SOURCE_ENV, ""),
            min_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_time_is_rfc3339_seconds() {
        let cfg = EncoderConfig::production();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(cfg.format_time(t), "2024-05-01T10:00:00Z");
    }

    #[test]
    fn level_formatter_overrides_default() {
        let cfg = EncoderConfig::production().with_level_formatter(capital_level);
        assert_eq!(cfg.format_level(Level::Warn), "WARN");
        assert_eq!(EncoderConfig::production().format_level(Level::Warn), "warn");
    }

    #[test]
    fn key_names_deserialize_from_camel_case() {
        let cfg: EncoderConfig =
            serde_json::from_str(r#"{"messageKey":"message","levelKey":"severity"}"#).unwrap();
        assert_eq!(cfg.message_key, "message");
        assert_eq!(cfg.level_key, "severity");
        assert!(cfg.time_key.is_empty());
        assert!(cfg.encode_time.is_none());
    }

    #[test]
    fn stock_duration_formatters() {
        assert_eq!(string_duration(chrono::Duration::milliseconds(1500)), "1.5s");
        assert_eq!(string_duration(chrono::Duration::milliseconds(250)), "250ms");
        assert_eq!(string_duration(chrono::Duration::nanoseconds(-40)), "-40ns");
        assert_eq!(seconds_duration(chrono::Duration::milliseconds(2500)), "2.5");
    }

    #[test]
    fn producer_config_deserializes_with_defaults() {
        let cfg: ProducerConfig =
            serde_json::from_str(r#"{"project":"p","logstore":"s","min_level":"warn"}"#).unwrap();
        assert_eq!(cfg.project, "p");
        assert_eq!(cfg.logstore, "s");
        assert_eq!(cfg.topic, "");
        assert_eq!(cfg.min_level, Level::Warn);
    }
}
