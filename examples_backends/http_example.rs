use std::sync::Arc;

use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_logstore_sink::{
    config::ProducerConfig,
    http::HttpSink,
    init::{init_tracing_with_config, LayerConfig},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example: LOG_SINK_ENDPOINT=http://localhost:8080 LOG_SINK_PROJECT=demo LOG_SINK_LOGSTORE=app
    let sink = Arc::new(HttpSink::from_env()?);
    let destination = ProducerConfig::from_env()?;

    let guard = init_tracing_with_config(sink, destination, LayerConfig::default())?;

    info!("http example started");
    warn!(retries = 2u64, "upstream slow");
    error!(code = 502u64, upstream = "billing", "upstream unavailable");

    let stats = guard.stats();
    println!("enqueued {} records", stats.enqueued());
    guard.shutdown(Duration::from_secs(10)).await?;
    Ok(())
}
