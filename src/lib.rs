//! drainpool - a serial, in-process task pool
//!
//! Callers hand the pool zero-argument closures and return immediately. The
//! pool runs them one at a time, in submission order, on a background drain
//! thread that exists only while there is work queued.
//!
//! # Quick Start
//!
//! ```no_run
//! use drainpool::prelude::*;
//! use std::time::Duration;
//!
//! let pool = Pool::new();
//!
//! pool.execute(|| println!("runs first"));
//! pool.execute(|| panic!("isolated, not counted"));
//! pool.execute(|| println!("still runs"));
//!
//! pool.wait_idle(Duration::from_secs(1));
//! assert_eq!(pool.processed_count(), 2);
//! ```
//!
//! # Guarantees
//!
//! - **FIFO**: tasks run in the order they were queued
//! - **Serial**: no two tasks of one pool ever overlap
//! - **Failure isolation**: a panicking or `Err`-returning task is logged and
//!   skipped; the rest of the queue keeps draining
//! - **Fire-and-forget**: `submit` never waits for a task to run

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;
pub mod util;

pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{FailureStrategy, Pool, Task, TaskError, TaskId};
