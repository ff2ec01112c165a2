//! Named task queues, task bookkeeping, and status lookup.
//!
//! [`TaskQueue`] is the seam dispatchers depend on. [`LocalTaskQueue`] runs
//! handlers on tokio worker pools inside this process.

pub mod backend;
pub mod error;
pub mod handler;
mod ledger;
pub mod local;
pub mod status;
pub mod task;

pub use backend::TaskQueue;
pub use error::QueueError;
pub use handler::{TaskContext, TaskFailure, TaskHandler};
pub use local::{LaneStats, LocalTaskQueue, QueueStats};
pub use status::TaskStatusQuery;
pub use task::{
    TaskId, TaskRecord, TaskRequest, TaskState, TaskStatusReport, DEFAULT_QUEUE, MAINTENANCE_QUEUE,
};
