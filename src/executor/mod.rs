//! Task execution infrastructure.
//!
//! This module provides the task type, the failure isolation used by the
//! drain loop, and the serial [`Pool`] itself.

pub mod failure;
pub mod pool;
pub mod task;

pub use failure::{FailureHandler, FailureInfo, FailureKind, FailureStrategy};
pub use pool::Pool;
pub use task::{Task, TaskError, TaskId};
