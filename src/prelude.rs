pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{FailureStrategy, Pool, Task, TaskError};
pub use crate::telemetry::MetricsSnapshot;
