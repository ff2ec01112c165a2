//! Crew execution: persistence seam, crew engine seam, and the queue tasks
//! that drive an Execution from `running` to a terminal status.

pub mod cleanup;
pub mod crew;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod task;

use std::sync::Arc;

use crewstream_queue::LocalTaskQueue;

pub use cleanup::{CleanupReport, CleanupTask};
pub use crew::{Crew, CrewEngine, CrewError, DisabledCrewEngine, RemoteCrewEngine};
pub use error::ExecutionError;
pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;
pub use store::{Database, Session};
pub use task::{normalize_result, ExecutionSummary, ExecutionTask};

/// Task name for crew runs.
pub const EXECUTE_CREW: &str = "execute_crew";
/// Task name for execution cleanup checks.
pub const CLEANUP_EXECUTION: &str = "cleanup_execution";

/// Register both execution tasks on `queue`.
pub fn register_tasks(queue: &LocalTaskQueue, execute: Arc<ExecutionTask>, cleanup: Arc<CleanupTask>) {
    queue.register(EXECUTE_CREW, execute);
    queue.register(CLEANUP_EXECUTION, cleanup);
}
