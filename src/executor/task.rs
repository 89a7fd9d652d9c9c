//! Task representation and execution.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error value reported by a fallible task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        TaskError(msg.into())
    }
}

type Job = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

/// A unit of work accepted by [`Pool`](super::Pool).
///
/// Tasks are opaque to the pool: it never inspects what they do, only
/// whether they completed. An empty task carries no work and is ignored
/// on submission.
pub struct Task {
    id: TaskId,
    func: Option<Job>,
}

impl Task {
    /// Create a task from an infallible closure
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_job(Box::new(move || {
            f();
            Ok(())
        }))
    }

    /// Create a task whose `Err` return counts as a failure
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        Self::from_job(Box::new(move || f().map_err(|e| TaskError(e.to_string()))))
    }

    /// A task with no work attached
    pub fn empty() -> Self {
        Task {
            id: TaskId::next(),
            func: None,
        }
    }

    fn from_job(func: Job) -> Self {
        Task {
            id: TaskId::next(),
            func: Some(func),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.func.is_none()
    }

    /// Execute the task, consuming it
    pub(crate) fn execute(self) -> Result<(), TaskError> {
        match self.func {
            Some(func) => func(),
            None => Ok(()),
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Task::empty()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("empty", &self.is_empty())
            .finish()
    }
}
