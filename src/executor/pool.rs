use super::failure::FailureHandler;
use super::task::Task;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use crate::util::Backoff;
use crossbeam_deque::{Injector, Steal};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Whether a drain loop currently owns the queue.
///
/// `Idle -> Draining` happens in `try_submit`, `Draining -> Idle` in the
/// drain loop. Both transitions happen under `Shared::state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainState {
    Idle,
    Draining,
}

struct Shared {
    config: Config,
    queue: Injector<Task>,
    state: Mutex<DrainState>,
    idle: Condvar,
    failures: FailureHandler,
    metrics: Metrics,
}

/// Runs submitted tasks one at a time, in the order they were queued.
///
/// Submission never blocks on task execution. The first submission to an
/// idle pool spawns a drain thread that works through the queue and exits
/// once the queue is empty; later submissions either land in the running
/// drain's queue or start a fresh one.
///
/// ```no_run
/// use drainpool::Pool;
///
/// let pool = Pool::new();
/// pool.execute(|| println!("first"));
/// pool.execute(|| println!("second"));
/// ```
pub struct Pool {
    shared: Arc<Shared>,
}

impl Pool {
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: Config) -> Self {
        let failures = FailureHandler::new(config.failure_strategy);

        Self {
            shared: Arc::new(Shared {
                config,
                queue: Injector::new(),
                state: Mutex::new(DrainState::Idle),
                idle: Condvar::new(),
                failures,
                metrics: Metrics::new(),
            }),
        }
    }

    /// Queue a task. `None` and empty tasks are ignored.
    ///
    /// If the drain thread cannot be spawned the error is logged and the
    /// task stays queued until the next submission.
    pub fn submit(&self, task: impl Into<Option<Task>>) {
        if let Err(e) = self.try_submit(task) {
            error!(pool = %self.shared.config.name, error = %e, "failed to start drain loop");
        }
    }

    /// Like [`submit`](Self::submit), but reports a failure to spawn the
    /// drain thread. The task remains queued in that case.
    pub fn try_submit(&self, task: impl Into<Option<Task>>) -> Result<()> {
        let task = match task.into() {
            Some(task) if !task.is_empty() => task,
            _ => return Ok(()),
        };

        debug!(pool = %self.shared.config.name, task_id = %task.id(), "task queued");
        self.shared.queue.push(task);
        self.shared.metrics.record_submitted();

        let mut state = self.shared.state.lock();
        if *state == DrainState::Draining {
            return Ok(());
        }

        *state = DrainState::Draining;
        if let Err(e) = self.spawn_drain() {
            *state = DrainState::Idle;
            self.shared.idle.notify_all();
            return Err(e);
        }

        Ok(())
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::new(f));
    }

    pub fn execute_fallible<F, E>(&self, f: F)
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        self.submit(Task::fallible(f));
    }

    // Called with the state lock held and the state already set to Draining.
    fn spawn_drain(&self) -> Result<()> {
        let shared = self.shared.clone();
        let mut builder = thread::Builder::new().name(self.shared.config.thread_name());

        if let Some(stack_size) = self.shared.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        builder
            .spawn(move || shared.drain())
            .map(|_| ())
            .map_err(|e| Error::executor(format!("spawn failed: {}", e)))
    }

    /// Number of tasks waiting in the queue, excluding one that is running.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// True when no drain loop is active.
    pub fn is_idle(&self) -> bool {
        *self.shared.state.lock() == DrainState::Idle
    }

    /// Tasks that ran to completion without panicking or returning `Err`.
    pub fn processed_count(&self) -> u64 {
        self.shared.metrics.processed()
    }

    pub fn failed_count(&self) -> u64 {
        self.shared.metrics.failed()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Block until the pool is idle with an empty queue, or `timeout` passes.
    ///
    /// Returns whether the pool went idle. This is an extension on top of the
    /// fire-and-forget contract of `submit`; nothing inside the pool relies
    /// on it.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();

        while *state == DrainState::Draining || !self.shared.queue.is_empty() {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return *state == DrainState::Idle && self.shared.queue.is_empty();
            }
        }

        true
    }
}

/// Returns the pool to idle if the drain loop unwinds, so the next
/// submission can start a fresh drain.
struct DrainGuard<'a> {
    shared: &'a Shared,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }

        *self.shared.state.lock() = DrainState::Idle;
        self.shared.idle.notify_all();
        error!(
            pool = %self.shared.config.name,
            pending = self.shared.queue.len(),
            "drain loop unwound"
        );
    }
}

impl Shared {
    fn drain(&self) {
        let _guard = DrainGuard { shared: self };

        self.metrics.record_drain_started();
        info!(pool = %self.config.name, pending = self.queue.len(), "drain started");

        let mut backoff = Backoff::new();

        loop {
            match self.queue.steal() {
                Steal::Success(task) => {
                    backoff.reset();
                    self.run_task(task);
                }
                Steal::Retry => backoff.spin(),
                Steal::Empty => {
                    // A submitter pushes before taking the lock, so anything
                    // queued before this check is seen here, and anything
                    // queued after it finds the pool idle and starts a new
                    // drain.
                    let mut state = self.state.lock();
                    if self.queue.is_empty() {
                        *state = DrainState::Idle;
                        self.idle.notify_all();
                        drop(state);

                        info!(
                            pool = %self.config.name,
                            processed = self.metrics.processed(),
                            "idle"
                        );
                        return;
                    }
                }
            }
        }
    }

    fn run_task(&self, task: Task) {
        let task_id = task.id();
        let start = Instant::now();

        match self.failures.run(task) {
            Ok(()) => {
                self.metrics.record_processed(start.elapsed());
                debug!(pool = %self.config.name, %task_id, "task completed");
            }
            Err(_) => self.metrics.record_failed(start.elapsed()),
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.shared.config.name)
            .field("state", &*self.shared.state.lock())
            .field("pending", &self.pending_count())
            .field("processed", &self.processed_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FailureStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(10);

    fn quiet_pool() -> Pool {
        let config = Config::builder()
            .failure_strategy(FailureStrategy::Isolate)
            .build()
            .unwrap();
        Pool::with_config(config).unwrap()
    }

    #[test]
    fn test_new_pool_is_idle() {
        let pool = Pool::new();
        assert!(pool.is_idle());
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.processed_count(), 0);
        assert!(pool.wait_idle(Duration::ZERO));
    }

    #[test]
    fn test_runs_in_fifo_order() {
        let pool = Pool::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let order = order.clone();
            pool.execute(move || order.lock().push(i));
        }

        assert!(pool.wait_idle(WAIT));
        assert_eq!(*order.lock(), (0..50).collect::<Vec<_>>());
        assert_eq!(pool.processed_count(), 50);
    }

    #[test]
    fn test_none_and_empty_are_noops() {
        let pool = Pool::new();

        pool.submit(None::<Task>);
        pool.submit(Task::empty());
        pool.submit(Task::default());

        assert!(pool.is_idle());
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.processed_count(), 0);
        assert_eq!(pool.metrics().drain_runs, 0);
        assert_eq!(pool.metrics().tasks_submitted, 0);
    }

    #[test]
    fn test_submit_does_not_block() {
        let pool = Pool::new();
        let start = Instant::now();

        pool.execute(|| thread::sleep(Duration::from_millis(300)));

        assert!(start.elapsed() < Duration::from_millis(200));
        assert!(!pool.is_idle());
        assert!(pool.wait_idle(WAIT));
        assert_eq!(pool.processed_count(), 1);
    }

    #[test]
    fn test_failures_not_counted() {
        let pool = quiet_pool();
        let ran_after = Arc::new(AtomicUsize::new(0));

        pool.execute(|| {});
        pool.execute(|| panic!("boom"));
        pool.execute_fallible(|| Err::<(), _>("bad input"));
        let flag = ran_after.clone();
        pool.execute(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        });

        assert!(pool.wait_idle(WAIT));
        assert_eq!(pool.processed_count(), 2);
        assert_eq!(pool.failed_count(), 2);
        assert_eq!(ran_after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tasks_never_overlap() {
        let pool = Pool::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let active = active.clone();
            let max_active = max_active.clone();
            pool.execute(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        assert!(pool.wait_idle(WAIT));
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pending_count_while_draining() {
        let pool = Pool::new();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));

        let blocker = gate.clone();
        pool.execute(move || {
            let (open, cv) = &*blocker;
            let mut open = open.lock();
            while !*open {
                cv.wait(&mut open);
            }
        });

        // Wait until the blocker has been dequeued.
        let deadline = Instant::now() + WAIT;
        while pool.pending_count() != 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        pool.execute(|| {});
        pool.execute(|| {});
        assert_eq!(pool.pending_count(), 2);
        assert!(!pool.is_idle());

        {
            let (open, cv) = &*gate;
            *open.lock() = true;
            cv.notify_all();
        }

        assert!(pool.wait_idle(WAIT));
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.processed_count(), 3);
    }

    #[test]
    fn test_restarts_after_idle() {
        let pool = Pool::new();

        pool.execute(|| {});
        assert!(pool.wait_idle(WAIT));

        pool.execute(|| {});
        assert!(pool.wait_idle(WAIT));

        assert_eq!(pool.processed_count(), 2);
        assert_eq!(pool.metrics().drain_runs, 2);
    }

    #[test]
    fn test_drain_thread_is_named() {
        let config = Config::builder().name("named").build().unwrap();
        let pool = Pool::with_config(config).unwrap();
        let seen = Arc::new(Mutex::new(None));

        let slot = seen.clone();
        pool.execute(move || {
            *slot.lock() = thread::current().name().map(str::to_string);
        });

        assert!(pool.wait_idle(WAIT));
        assert_eq!(seen.lock().as_deref(), Some("named-drain"));
    }

    #[test]
    fn test_wait_idle_times_out() {
        let pool = Pool::new();
        pool.execute(|| thread::sleep(Duration::from_millis(300)));

        assert!(!pool.wait_idle(Duration::from_millis(10)));
        assert!(pool.wait_idle(WAIT));
    }

    struct PanicOnDrop;

    impl Drop for PanicOnDrop {
        fn drop(&mut self) {
            panic!("payload drop panicked");
        }
    }

    #[test]
    fn test_panicking_payload_drop_keeps_draining() {
        let pool = quiet_pool();
        let later = Arc::new(AtomicUsize::new(0));

        pool.execute(|| std::panic::panic_any(PanicOnDrop));
        let count = later.clone();
        pool.execute(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(pool.wait_idle(WAIT));
        thread::sleep(Duration::from_millis(50));

        let count = later.clone();
        pool.execute(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(pool.wait_idle(WAIT));
        assert_eq!(later.load(Ordering::SeqCst), 2);
        assert_eq!(pool.processed_count(), 2);
        assert_eq!(pool.failed_count(), 1);
        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn test_spawn_failure_leaves_task_queued() {
        let config = Config::builder()
            .stack_size(usize::MAX / 2)
            .build()
            .unwrap();
        let pool = Pool::with_config(config).unwrap();

        let result = pool.try_submit(Task::new(|| {}));

        assert!(matches!(result, Err(Error::Executor(_))));
        assert!(pool.is_idle());
        assert_eq!(pool.pending_count(), 1);
        assert_eq!(pool.processed_count(), 0);
        assert!(!pool.wait_idle(Duration::from_millis(50)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            name: String::new(),
            ..Config::default()
        };
        assert!(matches!(Pool::with_config(config), Err(Error::Config(_))));
    }
}
