//! Worker pool demo binary

use ringpool::{PoolConfig, StatsSnapshot, ThreadPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let workers: usize = args.next().and_then(|a| a.parse().ok()).unwrap_or(4);
    let tasks: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(1_000_000);

    println!("ringpool demo: {workers} workers, {tasks} tasks\n");

    let config: PoolConfig = PoolConfig::simple(workers, 1024);
    let pool: ThreadPool = ThreadPool::new(config)?;

    let checksum: Arc<AtomicU64> = Arc::new(AtomicU64::new(0));
    let start: Instant = Instant::now();

    for i in 0..tasks {
        let checksum: Arc<AtomicU64> = Arc::clone(&checksum);
        pool.submit(move || {
            // A few ns of real work per task
            let mut x: u64 = i.wrapping_mul(0x9e37_79b9_7f4a_7c15);
            x ^= x >> 31;
            checksum.fetch_add(x, Ordering::Relaxed);
        });
    }

    // Every task either ran on a worker or on this thread via caller-runs
    while pool.stats().executed() < tasks {
        std::thread::sleep(Duration::from_millis(1));
    }
    let elapsed: Duration = start.elapsed();

    pool.shutdown();

    let snapshot: StatsSnapshot = pool.stats().snapshot();
    println!("{snapshot}");
    println!(
        "Throughput: {:.0} tasks/s (checksum {:x})",
        tasks as f64 / elapsed.as_secs_f64(),
        checksum.load(Ordering::Relaxed)
    );
    println!("\nJSON: {}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
