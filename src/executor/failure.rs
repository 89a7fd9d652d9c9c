use super::task::{Task, TaskId};
use crate::error::Error;
use std::fmt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What to do after a task fails. The drain loop keeps going either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureStrategy {
    /// Swallow the failure without logging.
    Isolate,
    #[default]
    LogAndContinue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Panic,
    Error,
}

#[derive(Debug, Clone)]
pub struct FailureInfo {
    pub task_id: TaskId,
    pub kind: FailureKind,
    pub message: String,
}

impl FailureInfo {
    fn from_panic(task_id: TaskId, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        drop_payload(payload);

        Self {
            task_id,
            kind: FailureKind::Panic,
            message,
        }
    }
}

// A payload's own Drop may panic; that must not unwind out of the drain loop.
fn drop_payload(payload: Box<dyn Any + Send>) {
    if let Err(nested) = catch_unwind(AssertUnwindSafe(move || drop(payload))) {
        std::mem::forget(nested);
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Panic => write!(f, "task {} panicked: {}", self.task_id, self.message),
            FailureKind::Error => write!(f, "task {} returned error: {}", self.task_id, self.message),
        }
    }
}

impl From<FailureInfo> for Error {
    fn from(info: FailureInfo) -> Self {
        Error::task_failed(info.to_string())
    }
}

#[derive(Debug)]
pub struct FailureHandler {
    strategy: FailureStrategy,
}

impl FailureHandler {
    pub fn new(strategy: FailureStrategy) -> Self {
        Self { strategy }
    }

    /// Run a task, converting panics and `Err` returns into [`FailureInfo`].
    pub fn run(&self, task: Task) -> Result<(), FailureInfo> {
        let task_id = task.id();

        let failure = match catch_unwind(AssertUnwindSafe(|| task.execute())) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => FailureInfo {
                task_id,
                kind: FailureKind::Error,
                message: err.0,
            },
            Err(payload) => FailureInfo::from_panic(task_id, payload),
        };

        if self.strategy == FailureStrategy::LogAndContinue {
            tracing::warn!(
                task_id = %failure.task_id,
                kind = ?failure.kind,
                message = %failure.message,
                "task failed"
            );
        }

        Err(failure)
    }

}

impl Default for FailureHandler {
    fn default() -> Self {
        Self::new(FailureStrategy::default())
    }
}
