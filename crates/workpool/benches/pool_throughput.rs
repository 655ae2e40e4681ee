//! Pool throughput benchmark
//!
//! Measures the critical path: submit → process → publish → consume,
//! across worker counts and with a deliberately small result buffer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::StreamExt;
use tokio::runtime::Runtime;

use workpool::{Job, NoopObserver, Pool, PoolConfig};

const JOBS_PER_ITER: u64 = 1_000;

async fn run_batch(config: PoolConfig, jobs: u64) -> Duration {
    let pool = Pool::start(config, Arc::new(NoopObserver), |_ctx, n: u64| async move {
        Ok(n.wrapping_mul(31))
    })
    .unwrap();
    let results = pool.results();

    let start = Instant::now();
    let consumer = tokio::spawn(async move { results.count().await });
    for id in 0..jobs {
        pool.submit(Job::new(id, id)).await.unwrap();
    }
    pool.close();
    let consumed = consumer.await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(consumed as u64, jobs);
    elapsed
}

/// Throughput by worker count with a roomy result buffer
fn bench_workers(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("pool_throughput/workers");
    group.throughput(Throughput::Elements(JOBS_PER_ITER));

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.to_async(&rt).iter_custom(|iters| async move {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let config = PoolConfig::new(workers)
                        .with_queue_capacity(256)
                        .with_result_capacity(256);
                    total += run_batch(config, JOBS_PER_ITER).await;
                }
                total
            });
        });
    }

    group.finish();
}

/// Cost of backpressure: a one-slot result buffer forces a handoff per job
fn bench_backpressure(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("pool_throughput/backpressure");
    group.throughput(Throughput::Elements(JOBS_PER_ITER));

    for result_capacity in [1, 16, 256] {
        group.bench_with_input(
            BenchmarkId::new("result_capacity", result_capacity),
            &result_capacity,
            |b, &result_capacity| {
                b.to_async(&rt).iter_custom(|iters| async move {
                    let mut total = Duration::ZERO;
                    for _ in 0..iters {
                        let config = PoolConfig::new(4)
                            .with_queue_capacity(64)
                            .with_result_capacity(result_capacity);
                        total += run_batch(config, JOBS_PER_ITER).await;
                    }
                    total
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_workers, bench_backpressure);
criterion_main!(benches);
