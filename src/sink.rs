use crate::record::LogBatch;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogBatch`]es produced by a
/// [`BatchProducer`](crate::producer::BatchProducer).
///
/// Implementations are responsible for transporting records to a concrete
/// backend (HTTP ingestion endpoint, stdout, etc). The producer calls `send`
/// from a background task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send one batch of records sharing a destination.
    ///
    /// **Returns**
    /// - `Ok(())` if the batch was accepted by the backend.
    /// - `Err(..)` if the backend failed (network error, serialization
    ///   error, HTTP status, etc.). The producer treats this as a transient
    ///   failure and retries the batch with backoff, up to its retry limit.
    async fn send(&self, batch: &LogBatch) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered records, if the backend implements buffering.
    ///
    /// Called once when the producer closes. Default implementation is a
    /// no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
