use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_logstore_sink::{
    config::ProducerConfig,
    init::{init_tracing_with_config, LayerConfig},
    record::LogBatch,
    sink::LogSink,
};

/// Example of integrating a completely custom backend by implementing
/// the `LogSink` trait directly. Imagine this talks to some
/// proprietary store for which this crate does not provide a built-in
/// sink.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn send(&self, batch: &LogBatch) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Here you would call your own client library for the target store.
        // For the sake of example we just print the records.
        for record in &batch.records {
            println!("[my-custom-db] {}/{} {:?}", batch.destination.project, batch.destination.logstore, record);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomDbSink);
    let destination = ProducerConfig::new("demo", "custom-db");

    let guard = init_tracing_with_config(sink, destination, LayerConfig::default())?;

    info!("custom backend example started");
    let span = tracing::info_span!("request", request_id = "r-1");
    span.in_scope(|| {
        error!(db = "my-custom-db", "simulated error sent via custom backend");
    });

    guard.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}
