use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use tracing_logstore_sink::init::init_tracing;
use tracing_logstore_sink::noop_sink::NoopSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());
    let guard = init_tracing(sink)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let stats_dropped = guard.stats().dropped();
    guard.shutdown(Duration::from_secs(10)).await?;
    println!("dropped on full queue: {}", stats_dropped);
    Ok(())
}
