//! Submits a handful of slow tasks, one of which fails, and reports the
//! pool's counters once everything has run.
//!
//! Run with `RUST_LOG=drainpool=debug` to see the drain events.

use drainpool::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("drainpool=info")),
        )
        .init();

    let config = Config::builder().name("demo").build()?;
    let pool = Pool::with_config(config)?;

    for (i, ms) in [200u64, 600, 900, 400].into_iter().enumerate() {
        pool.execute_fallible(move || {
            thread::sleep(Duration::from_millis(ms));
            if i == 2 {
                return Err("third task gave up");
            }
            println!("task {} finished after {}ms", i + 1, ms);
            Ok(())
        });
    }

    println!("submitted, {} pending", pool.pending_count());
    pool.wait_idle(Duration::from_secs(10));

    let stats = pool.metrics();
    println!(
        "processed={} failed={} drains={} avg={:?}",
        stats.tasks_processed,
        stats.tasks_failed,
        stats.drain_runs,
        stats.avg_task_time()
    );

    Ok(())
}
