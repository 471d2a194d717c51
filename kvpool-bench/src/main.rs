//! # Pool Load Harness
//!
//! Purpose: Drive concurrent borrow-use-return cycles against a live
//! Redis-compatible endpoint and report throughput and how often callers
//! found the pool exhausted.
//!
//! ## Usage
//! ```text
//! kvpool-bench [endpoint] [capacity] [workers] [cycles-per-worker]
//! kvpool-bench "127.0.0.1:6379 0" 20 64 10000
//! ```
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use kvpool_client::{InitOptions, Pool, RedisBackend};
use kvpool_common::PoolConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "127.0.0.1:6379 0";
const DEFAULT_CAPACITY: usize = 20;
const DEFAULT_WORKERS: usize = 64;
const DEFAULT_CYCLES: usize = 10_000;
const BENCH_KEY: &[u8] = b"kvpool:bench:counter";

struct BenchConfig {
    endpoint: String,
    capacity: usize,
    workers: usize,
    cycles: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let endpoint = args.next().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let capacity = parse_usize(args.next(), DEFAULT_CAPACITY);
        let workers = parse_usize(args.next(), DEFAULT_WORKERS);
        let cycles = parse_usize(args.next(), DEFAULT_CYCLES);

        BenchConfig {
            endpoint,
            capacity,
            workers,
            cycles,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

#[derive(Default)]
struct Counters {
    ok: AtomicU64,
    errors: AtomicU64,
    exhausted: AtomicU64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bench = BenchConfig::from_args();
    if bench.workers == 0 || bench.cycles == 0 {
        bail!("workers and cycles must be positive");
    }

    let config = PoolConfig {
        endpoint: bench.endpoint.clone(),
        capacity: bench.capacity,
        connect_timeout_ms: Some(1_000),
        read_timeout_ms: Some(2_000),
        write_timeout_ms: Some(2_000),
        ..PoolConfig::default()
    };
    let pool = Pool::new(RedisBackend::from_config(&config));
    pool.initialize_from_str(&config.endpoint, InitOptions::new(config.capacity))
        .with_context(|| format!("initializing pool for `{}`", bench.endpoint))?;

    let counters = Arc::new(Counters::default());
    let start = Instant::now();
    let workers: Vec<_> = (0..bench.workers)
        .map(|_| {
            let pool = pool.clone();
            let counters = Arc::clone(&counters);
            let cycles = bench.cycles;
            thread::spawn(move || run_worker(&pool, &counters, cycles))
        })
        .collect();

    for worker in workers {
        if worker.join().is_err() {
            bail!("worker thread panicked");
        }
    }
    let elapsed = start.elapsed();

    let ok = counters.ok.load(Ordering::Relaxed);
    let errors = counters.errors.load(Ordering::Relaxed);
    let exhausted = counters.exhausted.load(Ordering::Relaxed);
    let stats = pool.stats();
    info!(
        capacity = stats.capacity,
        idle = stats.idle,
        on_loan = stats.on_loan,
        "pool after run"
    );
    println!(
        "ops={} errors={} exhausted={} elapsed={:.3}s throughput={:.0} ops/s",
        ok,
        errors,
        exhausted,
        elapsed.as_secs_f64(),
        ok as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    if stats.idle + stats.on_loan != stats.capacity {
        bail!("pool accounting drifted: {:?}", stats);
    }
    Ok(())
}

fn run_worker(pool: &Pool<RedisBackend>, counters: &Counters, cycles: usize) {
    let mut done = 0;
    let mut backoff = Duration::from_micros(50);
    while done < cycles {
        let Some(mut handle) = pool.acquire() else {
            counters.exhausted.fetch_add(1, Ordering::Relaxed);
            thread::sleep(backoff);
            backoff = (backoff * 2).min(Duration::from_millis(5));
            continue;
        };
        backoff = Duration::from_micros(50);

        let result = handle
            .connection()
            .map_err(anyhow::Error::from)
            .and_then(|conn| conn.incr(BENCH_KEY).map_err(anyhow::Error::from));
        match result {
            Ok(_) => {
                counters.ok.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "bench command failed");
                handle.invalidate();
            }
        }
        drop(handle);
        done += 1;
    }
}
