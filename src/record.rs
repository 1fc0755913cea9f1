use crate::config::ProducerConfig;
use crate::encoder::FlatMap;
use serde::Serialize;

/// Where a record is delivered: fixed per core, not per entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Destination {
    pub project: String,
    pub logstore: String,
    pub topic: String,
    pub source: String,
}

impl From<&ProducerConfig> for Destination {
    fn from(cfg: &ProducerConfig) -> Self {
        Destination {
            project: cfg.project.clone(),
            logstore: cfg.logstore.clone(),
            topic: cfg.topic.clone(),
            source: cfg.source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogContent {
    pub key: String,
    pub value: String,
}

/// One finalized entry: Unix seconds plus its key/value contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub time: u32,
    pub contents: Vec<LogContent>,
}

impl LogRecord {
    /// Contents follow the key order of the flat map.
    pub fn new(time: u32, fields: FlatMap) -> Self {
        let contents = fields
            .into_iter()
            .map(|(key, value)| LogContent { key, value })
            .collect();
        LogRecord { time, contents }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.contents
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value.as_str())
    }
}

/// Records sharing a destination, as handed to a [`LogSink`](crate::sink::LogSink).
#[derive(Debug, Clone, Serialize)]
pub struct LogBatch {
    #[serde(flatten)]
    pub destination: Destination,
    pub records: Vec<LogRecord>,
}
