// Demo driver for the worker pool
// Decision: Configuration comes from the environment (and an optional .env file)
// Decision: Ctrl-C cancels the pool; queued jobs come back as cancelled results

use std::time::Duration;

use anyhow::{Context as _, Result};
use futures::StreamExt;
use tracing::{info, warn};
use workpool::{init_telemetry, Job, JobContext, Pool, PoolConfig, PoolError, TelemetryConfig};

#[derive(Debug, Default)]
struct Tally {
    succeeded: u64,
    failed: u64,
    cancelled: u64,
    checksum: u64,
}

/// Simulated work: sleeps proportionally to the input, fails on multiples of 13
async fn simulate(ctx: JobContext, n: u64) -> Result<u64> {
    tokio::time::sleep(Duration::from_millis((n % 7) * 10)).await;
    anyhow::ensure!(n % 13 != 0, "input {n} is unlucky");
    if ctx.is_cancelled() {
        info!(job_id = %ctx.job_id(), "Finishing job after cancellation");
    }
    Ok(n * n)
}

async fn produce(pool: &Pool<u64, u64>, job_count: u64) -> Result<u64> {
    let mut submitted = 0;
    for n in 1..=job_count {
        match pool.submit(Job::new(n, n)).await {
            Ok(()) => submitted += 1,
            Err(PoolError::Cancelled) | Err(PoolError::QueueClosed) => break,
            Err(e) => return Err(e).context("Failed to submit job"),
        }
    }
    Ok(submitted)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut telemetry_config = TelemetryConfig::from_env();
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter = Some("workpool=debug,workpool_demo=info".to_string());
    }
    init_telemetry(&telemetry_config);

    let config = PoolConfig::from_env();
    let job_count: u64 = std::env::var("DEMO_JOBS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(50);

    info!(
        pool = %config.name,
        workers = config.worker_count,
        queue_capacity = config.queue_capacity,
        job_count,
        "Starting demo"
    );

    let drain_timeout = config.drain_timeout;
    let pool = Pool::new(config, simulate).context("Failed to start pool")?;

    let results = pool.results();
    let consumer = tokio::spawn(async move {
        let mut tally = Tally::default();
        let mut results = results;
        while let Some(result) = results.next().await {
            match result.into_outcome() {
                Ok(value) => {
                    tally.succeeded += 1;
                    tally.checksum = tally.checksum.wrapping_add(value);
                }
                Err(workpool::JobError::Cancelled) => tally.cancelled += 1,
                Err(_) => tally.failed += 1,
            }
        }
        tally
    });

    tokio::select! {
        submitted = produce(&pool, job_count) => {
            info!(submitted = submitted?, "All jobs submitted");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, cancelling pool");
            pool.cancel();
        }
    }

    match pool.shutdown(drain_timeout).await {
        Ok(()) => info!("Pool drained"),
        Err(e) => warn!(error = %e, "Pool did not drain cleanly"),
    }

    let tally = consumer.await.context("Result consumer failed")?;
    info!(
        succeeded = tally.succeeded,
        failed = tally.failed,
        cancelled = tally.cancelled,
        checksum = tally.checksum,
        "Demo finished"
    );

    println!("{}", serde_json::to_string_pretty(&pool.metrics())?);
    Ok(())
}
