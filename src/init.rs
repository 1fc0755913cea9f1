use crate::adapter::LogStoreCore;
use crate::config::{EncoderConfig, ProducerConfig};
use crate::core::Core;
use crate::encoder::FieldEncoder;
use crate::error::{ProducerError, Result};
use crate::layer::LogStoreLayer;
use crate::producer::{BatchProducer, Producer, ProducerOptions, ProducerStats};
use crate::sink::LogSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global logging pipeline.
///
/// **Fields**
/// - `encoder`: key names and formatters of the flat records.
/// - `producer`: buffering and batching of the background delivery task.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`LogStoreLayer`] and every event is also printed to
///   the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub encoder: EncoderConfig,
    pub producer: ProducerOptions,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::production(),
            producer: ProducerOptions::default(),
            enable_stdout: true,
        }
    }
}

/// Handle on a running pipeline: the root core, its producer and the
/// delivery task.
///
/// Dropping the guard does not flush; call [`LogStoreGuard::shutdown`]
/// before the runtime stops.
pub struct LogStoreGuard {
    core: LogStoreCore,
    producer: Arc<BatchProducer>,
    handle: JoinHandle<()>,
}

impl LogStoreGuard {
    /// Root core, e.g. to derive cores with [`LogStoreCore::with_fields`].
    pub fn core(&self) -> &LogStoreCore {
        &self.core
    }

    pub fn stats(&self) -> &ProducerStats {
        self.producer.stats()
    }

    /// Flush outstanding records and wait for the delivery task to finish.
    ///
    /// The blocking close runs on the blocking pool so this is safe to
    /// await from any runtime flavor.
    pub async fn shutdown(self, timeout: Duration) -> Result<()> {
        let producer = Arc::clone(&self.producer);
        tokio::task::spawn_blocking(move || producer.close(timeout))
            .await
            .map_err(|e| ProducerError::Sink(Box::new(e)))??;
        self.handle
            .await
            .map_err(|e| ProducerError::Sink(Box::new(e)))?;
        Ok(())
    }
}

/// Build a [`LogStoreCore`] backed by a [`BatchProducer`] shipping to `sink`.
///
/// Must be called from within a Tokio runtime: the delivery task is spawned
/// on the current one.
pub fn build_core(
    sink: Arc<dyn LogSink>,
    encoder: EncoderConfig,
    config: ProducerConfig,
    options: ProducerOptions,
) -> LogStoreGuard {
    let (producer, handle) = BatchProducer::new(sink, options);
    let producer = Arc::new(producer);
    let core = LogStoreCore::new(
        FieldEncoder::new(Arc::new(encoder)),
        Arc::clone(&producer) as Arc<dyn Producer>,
        config,
    );
    LogStoreGuard {
        core,
        producer,
        handle,
    }
}

/// Install `core` behind a [`LogStoreLayer`] as the global `tracing`
/// subscriber.
pub fn install(core: Arc<dyn Core>, enable_stdout: bool) -> Result<()> {
    let layer = LogStoreLayer::from_arc(core);

    // Два варианта subscriber'а: типы слоёв с fmt и без него различаются.
    if enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Initialize the global `tracing` subscriber for `sink` with an explicit
/// destination and [`LayerConfig`].
///
/// **Returns** the [`LogStoreGuard`] to shut the pipeline down with.
///
/// **Errors** if a global subscriber is already installed.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    destination: ProducerConfig,
    config: LayerConfig,
) -> Result<LogStoreGuard> {
    let guard = build_core(sink, config.encoder, destination, config.producer);
    install(Arc::new(guard.core.clone()), config.enable_stdout)?;
    Ok(guard)
}

/// Initialize tracing with the destination read from the `LOG_SINK_*`
/// environment variables and [`LayerConfig::default`].
///
/// This is the recommended entrypoint for typical microservices.
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<LogStoreGuard> {
    let destination = ProducerConfig::from_env()?;
    init_tracing_with_config(sink, destination, LayerConfig::default())
}
