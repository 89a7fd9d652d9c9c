//! Counters describing what a pool has done so far.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Pool metrics collector
#[derive(Debug)]
pub struct Metrics {
    tasks_submitted: AtomicU64,
    tasks_processed: AtomicU64,
    tasks_failed: AtomicU64,
    drain_runs: AtomicU64,
    busy_time_ns: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_processed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            drain_runs: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
        }
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task that ran to completion
    pub fn record_processed(&self, duration: Duration) {
        self.busy_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        // Release pairs with the Acquire in `processed()` so that observers
        // who see the new count also see the task's side effects.
        self.tasks_processed.fetch_add(1, Ordering::Release);
    }

    pub fn record_failed(&self, duration: Duration) {
        self.busy_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        self.tasks_failed.fetch_add(1, Ordering::Release);
    }

    pub fn record_drain_started(&self) {
        self.drain_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.tasks_processed.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_processed: self.processed(),
            tasks_failed: self.failed(),
            drain_runs: self.drain_runs.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    /// Number of times a drain loop was started on an idle pool
    pub drain_runs: u64,
    pub busy_time_ns: u64,
}

impl MetricsSnapshot {
    /// Tasks that finished, successfully or not
    pub fn tasks_finished(&self) -> u64 {
        self.tasks_processed + self.tasks_failed
    }

    pub fn avg_task_time(&self) -> Duration {
        match self.tasks_finished() {
            0 => Duration::ZERO,
            n => Duration::from_nanos(self.busy_time_ns / n),
        }
    }
}
