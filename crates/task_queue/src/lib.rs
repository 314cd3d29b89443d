//! # Task Queue
//!
//! Ordered, single-flight task execution.
//!
//! Guarantees:
//! - tasks run in push order
//! - at most one handler invocation is in progress at any instant,
//!   even while the handler is suspended on I/O
//! - a failed task is contained: it is reported and the next task runs

pub mod metrics;
pub mod queue;

pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::{ErrorCallback, OrderedTaskQueue, QueueBuilder, TaskHandler};
