use crate::error::ProducerError;
use crate::record::{Destination, LogBatch, LogRecord};
use crate::sink::LogSink;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Transport contract used by [`LogStoreCore`](crate::adapter::LogStoreCore).
///
/// `send_log` is fire-and-forget: an error only reports that the record
/// could not be accepted right now. Delivery order is up to the producer.
pub trait Producer: Send + Sync {
    fn send_log(&self, destination: &Destination, record: LogRecord) -> Result<(), ProducerError>;

    /// Flush outstanding records and shut down, waiting at most `timeout`.
    fn close(&self, timeout: Duration) -> Result<(), ProducerError>;
}

/// Buffering and batching knobs for [`BatchProducer`].
///
/// **Fields**
/// - `channel_buffer`: maximum number of queued records before new ones are
///   rejected with [`ProducerError::QueueFull`].
/// - `batch_size`: number of records delivered to the sink at once.
/// - `flush_interval`: maximum delay before a partial batch is delivered.
/// - `max_retries`: extra attempts for a failing batch before it is dropped.
#[derive(Clone, Debug)]
pub struct ProducerOptions {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}

/// Counters maintained by [`BatchProducer`].
#[derive(Debug, Default)]
pub struct ProducerStats {
    total: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl ProducerStats {
    /// Records offered to `send_log`.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Given up on after exhausting retries.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

type Queued = (Destination, LogRecord);

/// [`Producer`] that queues records on a bounded channel and ships them to a
/// [`LogSink`] from a background Tokio task.
///
/// `close` blocks the calling thread until the worker has flushed. Call it
/// from outside the runtime, from `spawn_blocking`, or from a multi-threaded
/// runtime; on a current-thread runtime the worker cannot make progress and
/// the close times out.
pub struct BatchProducer {
    sender: RwLock<Option<mpsc::Sender<Queued>>>,
    done: Mutex<Option<std_mpsc::Receiver<()>>>,
    stats: Arc<ProducerStats>,
}

impl BatchProducer {
    /// Create a producer and spawn its delivery task on the current runtime.
    ///
    /// Minimal thresholds are enforced for `channel_buffer`, `batch_size`
    /// and `flush_interval` to avoid degenerate configurations.
    pub fn new(sink: Arc<dyn LogSink>, options: ProducerOptions) -> (Self, JoinHandle<()>) {
        let buffer = options.channel_buffer.max(16);
        let batch_size = options.batch_size.max(1);
        let flush_interval = options.flush_interval.max(Duration::from_millis(10));

        let (tx, rx) = mpsc::channel::<Queued>(buffer);
        let (done_tx, done_rx) = std_mpsc::channel();
        let stats = Arc::new(ProducerStats::default());

        let worker = Worker {
            sink,
            batch_size,
            max_retries: options.max_retries,
            stats: Arc::clone(&stats),
        };
        let handle = tokio::spawn(worker.run(rx, flush_interval, done_tx));

        (
            Self {
                sender: RwLock::new(Some(tx)),
                done: Mutex::new(Some(done_rx)),
                stats,
            },
            handle,
        )
    }

    pub fn stats(&self) -> &ProducerStats {
        &self.stats
    }
}

impl Producer for BatchProducer {
    fn send_log(&self, destination: &Destination, record: LogRecord) -> Result<(), ProducerError> {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(ProducerError::Closed);
        };
        match tx.try_send((destination.clone(), record)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(ProducerError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ProducerError::Closed),
        }
    }

    fn close(&self, timeout: Duration) -> Result<(), ProducerError> {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return Err(ProducerError::Closed);
        }
        // Dropping the only sender lets the worker drain and exit.
        drop(sender);

        let done = self.done.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(done) = done else {
            return Err(ProducerError::Closed);
        };
        match done.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(ProducerError::CloseTimeout(timeout)),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(ProducerError::Closed),
        }
    }
}

struct Worker {
    sink: Arc<dyn LogSink>,
    batch_size: usize,
    max_retries: u32,
    stats: Arc<ProducerStats>,
}

impl Worker {
    async fn run(
        self,
        mut rx: mpsc::Receiver<Queued>,
        flush_interval: Duration,
        done: std_mpsc::Sender<()>,
    ) {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut ticker = interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(item) => {
                        batch.push(item);
                        if batch.len() >= self.batch_size {
                            self.deliver(&mut batch).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        self.deliver(&mut batch).await;
                    }
                }
            }
        }

        if !batch.is_empty() {
            self.deliver(&mut batch).await;
        }
        if let Err(e) = self.sink.flush().await {
            tracing::warn!(error = %e, "log sink flush failed");
        }
        let _ = done.send(());
    }

    async fn deliver(&self, batch: &mut Vec<Queued>) {
        let mut groups: BTreeMap<Destination, Vec<LogRecord>> = BTreeMap::new();
        for (destination, record) in batch.drain(..) {
            groups.entry(destination).or_default().push(record);
        }

        for (destination, records) in groups {
            let count = records.len() as u64;
            let group = LogBatch {
                destination,
                records,
            };
            match self.send_with_retry(&group).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(count, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.failed.fetch_add(count, Ordering::Relaxed);
                    tracing::warn!(
                        error = %e,
                        records = count,
                        logstore = %group.destination.logstore,
                        "dropping log batch after retries"
                    );
                }
            }
        }
    }

    async fn send_with_retry(&self, batch: &LogBatch) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            match self.sink.send(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    tracing::debug!(error = %e, ?backoff, "log sink send failed, retrying");
                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                    attempt += 1;
                }
            }
        }
    }
}

/// [`Producer`] that keeps every record in memory.
///
/// Meant for tests and examples that need to inspect what a core sent.
#[derive(Debug, Default)]
pub struct MemoryProducer {
    records: Mutex<Vec<Queued>>,
    closed: AtomicBool,
}

impl MemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Destination, LogRecord)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Producer for MemoryProducer {
    fn send_log(&self, destination: &Destination, record: LogRecord) -> Result<(), ProducerError> {
        if self.is_closed() {
            return Err(ProducerError::Closed);
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((destination.clone(), record));
        Ok(())
    }

    fn close(&self, _timeout: Duration) -> Result<(), ProducerError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ProducerError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProducerConfig;
    use crate::encoder::FlatMap;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<LogBatch>>,
    }

    impl RecordingSink {
        fn record_count(&self) -> usize {
            self.batches.lock().unwrap().iter().map(|b| b.records.len()).sum()
        }
    }

    #[async_trait]
    impl LogSink for RecordingSink {
        async fn send(&self, batch: &LogBatch) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn send(&self, _batch: &LogBatch) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("backend unavailable".into())
        }
    }

    struct StuckSink;

    #[async_trait]
    impl LogSink for StuckSink {
        async fn send(&self, _batch: &LogBatch) -> Result<(), Box<dyn Error + Send + Sync>> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn dest(logstore: &str) -> Destination {
        Destination::from(&ProducerConfig::new("proj", logstore))
    }

    fn record(n: u32) -> LogRecord {
        let mut fields = FlatMap::new();
        fields.insert("n".to_string(), n.to_string());
        LogRecord::new(n, fields)
    }

    fn slow_flush() -> ProducerOptions {
        ProducerOptions {
            batch_size: 1000,
            flush_interval: Duration::from_secs(60),
            ..Default::default()
        }
    }

    async fn close_blocking(p: Arc<BatchProducer>, timeout: Duration) -> Result<(), ProducerError> {
        tokio::task::spawn_blocking(move || p.close(timeout))
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_flushes_pending_records() {
        let sink = Arc::new(RecordingSink::default());
        let (producer, _handle) = BatchProducer::new(sink.clone(), slow_flush());
        let producer = Arc::new(producer);

        for n in 0..5 {
            producer.send_log(&dest("app"), record(n)).unwrap();
        }
        producer.send_log(&dest("audit"), record(99)).unwrap();

        close_blocking(producer.clone(), Duration::from_secs(5)).await.unwrap();

        assert_eq!(sink.record_count(), 6);
        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().any(|b| b.destination.logstore == "audit" && b.records.len() == 1));
        assert_eq!(producer.stats().delivered(), 6);
        assert_eq!(producer.stats().enqueued(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_close_and_late_send_report_closed() {
        let sink = Arc::new(RecordingSink::default());
        let (producer, _handle) = BatchProducer::new(sink, ProducerOptions::default());
        let producer = Arc::new(producer);

        close_blocking(producer.clone(), Duration::from_secs(5)).await.unwrap();
        let second = close_blocking(producer.clone(), Duration::from_secs(5)).await;
        assert!(matches!(second, Err(ProducerError::Closed)));
        assert!(matches!(
            producer.send_log(&dest("app"), record(1)),
            Err(ProducerError::Closed)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_batches_are_counted_after_retries() {
        let options = ProducerOptions {
            batch_size: 2,
            max_retries: 1,
            ..Default::default()
        };
        let (producer, _handle) = BatchProducer::new(Arc::new(FailingSink), options);
        let producer = Arc::new(producer);
        producer.send_log(&dest("app"), record(1)).unwrap();
        producer.send_log(&dest("app"), record(2)).unwrap();

        close_blocking(producer.clone(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(producer.stats().failed(), 2);
        assert_eq!(producer.stats().delivered(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_queue_rejects_and_close_times_out() {
        let options = ProducerOptions {
            channel_buffer: 16,
            batch_size: 1,
            ..Default::default()
        };
        let (producer, _handle) = BatchProducer::new(Arc::new(StuckSink), options);
        let producer = Arc::new(producer);

        let rejected = (0..40)
            .map(|n| producer.send_log(&dest("app"), record(n)))
            .filter(|r| matches!(r, Err(ProducerError::QueueFull)))
            .count();
        assert!(rejected > 0);
        assert_eq!(producer.stats().dropped(), rejected as u64);

        let res = close_blocking(producer.clone(), Duration::from_millis(100)).await;
        assert!(matches!(res, Err(ProducerError::CloseTimeout(_))));
    }

    #[test]
    fn memory_producer_records_until_closed() {
        let producer = MemoryProducer::new();
        producer.send_log(&dest("app"), record(1)).unwrap();
        assert_eq!(producer.len(), 1);
        producer.close(Duration::from_secs(1)).unwrap();
        assert!(producer.is_closed());
        assert!(matches!(producer.send_log(&dest("app"), record(2)), Err(ProducerError::Closed)));
        assert!(matches!(producer.close(Duration::from_secs(1)), Err(ProducerError::Closed)));
    }
}
