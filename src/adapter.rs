use crate::config::ProducerConfig;
use crate::core::{CheckedEntry, Core};
use crate::encoder::FieldEncoder;
use crate::entry::Entry;
use crate::error::Result;
use crate::field::Field;
use crate::level::Level;
use crate::producer::Producer;
use crate::record::{Destination, LogRecord};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound `sync` waits for the producer to flush.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Core`] that encodes entries into flat string records and hands them to
/// a [`Producer`].
///
/// Lifecycle: constructed, then serving `write` calls, then closed by
/// `sync`. Writes after `sync` fail with the producer's `Closed` error.
#[derive(Clone)]
pub struct LogStoreCore {
    config: Arc<ProducerConfig>,
    destination: Arc<Destination>,
    enc: FieldEncoder,
    producer: Arc<dyn Producer>,
    sync_timeout: Duration,
}

impl LogStoreCore {
    pub fn new(enc: FieldEncoder, producer: Arc<dyn Producer>, config: ProducerConfig) -> Self {
        let destination = Destination::from(&config);
        LogStoreCore {
            config: Arc::new(config),
            destination: Arc::new(destination),
            enc,
            producer,
            sync_timeout: SYNC_TIMEOUT,
        }
    }

    /// Override the bound used by `sync`.
    #[must_use]
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Derive a core whose encoder also carries `fields`.
    ///
    /// The derived core shares the producer and configuration; its field map
    /// is an independent copy, so neither side sees the other's additions.
    pub fn with_fields(&self, fields: &[Field]) -> Result<Self> {
        let mut clone = self.clone();
        clone.enc.add_fields(fields)?;
        Ok(clone)
    }

    pub fn encoder(&self) -> &FieldEncoder {
        &self.enc
    }

    pub fn producer_config(&self) -> &ProducerConfig {
        &self.config
    }
}

impl Core for LogStoreCore {
    fn enabled(&self, level: Level) -> bool {
        level >= self.config.min_level
    }

    fn with(&self, fields: &[Field]) -> Result<Box<dyn Core>> {
        Ok(Box::new(self.with_fields(fields)?))
    }

    fn check<'a>(&'a self, entry: &Entry, checked: Option<CheckedEntry<'a>>) -> Option<CheckedEntry<'a>> {
        if self.enabled(entry.level) {
            return Some(CheckedEntry::add_core(checked, entry, self));
        }
        checked
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()> {
        let flat = self.enc.encode_entry(entry, fields)?;
        let now = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        let record = LogRecord::new(now, flat);
        self.producer.send_log(&self.destination, record)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.producer.close(self.sync_timeout)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderConfig;
    use crate::error::{Error, ProducerError};
    use crate::marshal::ObjectMarshalerFn;
    use crate::producer::MemoryProducer;

    fn core_with(min_level: Level) -> (LogStoreCore, Arc<MemoryProducer>) {
        let producer = Arc::new(MemoryProducer::new());
        let enc = FieldEncoder::new(Arc::new(EncoderConfig::production()));
        let config = ProducerConfig::new("proj", "store")
            .with_topic("web")
            .with_source("host-1")
            .with_min_level(min_level);
        (LogStoreCore::new(enc, producer.clone(), config), producer)
    }

    fn log(core: &dyn Core, entry: Entry, fields: &[Field]) -> Result<()> {
        match core.check(&entry, None) {
            Some(checked) => checked.write(fields),
            None => Ok(()),
        }
    }

    #[test]
    fn disabled_levels_never_reach_the_producer() {
        let (core, producer) = core_with(Level::Warn);
        log(&core, Entry::new(Level::Debug, "d"), &[]).unwrap();
        log(&core, Entry::new(Level::Info, "i"), &[]).unwrap();
        assert!(producer.is_empty());
        assert!(!core.enabled(Level::Info));
        assert!(core.enabled(Level::Fatal));
    }

    #[test]
    fn write_attaches_destination_and_time() {
        let (core, producer) = core_with(Level::Info);
        let before = Utc::now().timestamp() as u32;
        log(&core, Entry::new(Level::Error, "failed"), &[Field::i64("code", 500)]).unwrap();

        let records = producer.records();
        assert_eq!(records.len(), 1);
        let (dest, record) = &records[0];
        assert_eq!(dest.project, "proj");
        assert_eq!(dest.logstore, "store");
        assert_eq!(dest.topic, "web");
        assert_eq!(dest.source, "host-1");
        assert!(record.time >= before);
        assert_eq!(record.get("msg"), Some("failed"));
        assert_eq!(record.get("level"), Some("error"));
        assert_eq!(record.get("code"), Some("500"));
    }

    #[test]
    fn with_fields_is_copy_on_write() {
        let (root, producer) = core_with(Level::Info);
        let child = root.with_fields(&[Field::string("request_id", "r-1")]).unwrap();
        let grandchild = child.with(&[Field::string("user", "bob")]).unwrap();

        log(&root, Entry::new(Level::Info, "root"), &[]).unwrap();
        log(&child, Entry::new(Level::Info, "child"), &[]).unwrap();
        log(&*grandchild, Entry::new(Level::Info, "grandchild"), &[]).unwrap();

        let records = producer.records();
        let root_rec = &records[0].1;
        let child_rec = &records[1].1;
        let grand_rec = &records[2].1;
        assert_eq!(root_rec.get("request_id"), None);
        assert_eq!(root_rec.get("user"), None);
        assert_eq!(child_rec.get("request_id"), Some("r-1"));
        assert_eq!(child_rec.get("user"), None);
        assert_eq!(grand_rec.get("request_id"), Some("r-1"));
        assert_eq!(grand_rec.get("user"), Some("bob"));
    }

    #[test]
    fn encoding_error_aborts_the_write() {
        let (core, producer) = core_with(Level::Info);
        let bad = Field::object(
            "payload",
            ObjectMarshalerFn::new(|_| Err(Error::encoding("payload", "cyclic"))),
        );
        let err = log(&core, Entry::new(Level::Info, "x"), &[bad]).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
        assert!(producer.is_empty());
    }

    #[test]
    fn sync_twice_reports_closed_and_writes_fail_after() {
        let (core, producer) = core_with(Level::Info);
        core.sync().unwrap();
        assert!(producer.is_closed());
        assert!(matches!(core.sync(), Err(Error::Transport(ProducerError::Closed))));
        let err = core.write(&Entry::new(Level::Info, "late"), &[]).unwrap_err();
        assert!(matches!(err, Error::Transport(ProducerError::Closed)));
    }

    #[test]
    fn derived_cores_share_the_producer() {
        let (root, producer) = core_with(Level::Info);
        let child = root.with_fields(&[Field::bool("child", true)]).unwrap();
        child.sync().unwrap();
        assert!(producer.is_closed());
        assert!(root.sync().is_err());
    }
}
