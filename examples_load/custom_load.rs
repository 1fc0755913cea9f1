use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use tracing_logstore_sink::config::{rfc3339_nano_time, EncoderConfig, ProducerConfig};
use tracing_logstore_sink::init::{init_tracing_with_config, LayerConfig};
use tracing_logstore_sink::noop_sink::NoopSink;
use tracing_logstore_sink::producer::ProducerOptions;
use tracing_logstore_sink::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());

    let layer_config = LayerConfig {
        encoder: EncoderConfig {
            function_key: "func".to_string(),
            ..EncoderConfig::production()
        }
        .with_time_formatter(rfc3339_nano_time),
        producer: ProducerOptions {
            channel_buffer: 50_000,
            batch_size: 1_000,
            flush_interval: Duration::from_millis(200),
            max_retries: 1,
        },
        enable_stdout: false,
    };
    let destination = ProducerConfig::new("load-test", "errors")
        .with_source("custom_load")
        .with_min_level(Level::Warn);

    let guard = init_tracing_with_config(sink, destination, layer_config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let enqueued = guard.stats().enqueued();
    guard.shutdown(Duration::from_secs(10)).await?;
    println!("enqueued {} records", enqueued);
    Ok(())
}
