//! Observability for the pool.
//!
//! Diagnostic events go through `tracing`; this module only holds the
//! counters exposed by [`Pool::metrics`](crate::Pool::metrics).

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
