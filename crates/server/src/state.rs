use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crewstream_core::Config;
use crewstream_executor::Database;
use crewstream_queue::{LocalTaskQueue, TaskId, TaskStatusQuery};
use crewstream_realtime::RealtimeHub;
use uuid::Uuid;

/// Queue task that carries an execution, and the user who dispatched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub task_id: TaskId,
    pub user_id: String,
}

pub struct AppState {
    pub config: Config,
    pub hub: RealtimeHub,
    pub queue: Arc<LocalTaskQueue>,
    pub database: Arc<dyn Database>,
    pub task_status: TaskStatusQuery,
    /// execution id → dispatch. Only covers executions dispatched by this process.
    dispatches: RwLock<HashMap<Uuid, Dispatch>>,
    /// task id → user who queued it.
    task_owners: RwLock<HashMap<TaskId, String>>,
}

impl AppState {
    pub fn new(
        config: Config,
        hub: RealtimeHub,
        queue: Arc<LocalTaskQueue>,
        database: Arc<dyn Database>,
    ) -> Self {
        let task_status = TaskStatusQuery::new(queue.clone());
        Self {
            config,
            hub,
            queue,
            database,
            task_status,
            dispatches: RwLock::new(HashMap::new()),
            task_owners: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_dispatch(&self, execution_id: Uuid, dispatch: Dispatch) {
        self.record_task_owner(dispatch.task_id, &dispatch.user_id);
        self.dispatches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(execution_id, dispatch);
    }

    pub fn record_task_owner(&self, task_id: TaskId, user_id: &str) {
        self.task_owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id, user_id.to_string());
    }

    pub fn task_owner(&self, task_id: &TaskId) -> Option<String> {
        self.task_owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }

    /// Forget dispatches and owners whose queue record has expired.
    /// Returns how many entries were dropped.
    pub fn prune_dispatches(&self) -> usize {
        let mut dispatches = self.dispatches.write().unwrap_or_else(PoisonError::into_inner);
        let mut owners = self.task_owners.write().unwrap_or_else(PoisonError::into_inner);
        let before = dispatches.len() + owners.len();
        dispatches.retain(|_, d| self.queue.contains(&d.task_id));
        owners.retain(|task_id, _| self.queue.contains(task_id));
        before - dispatches.len() - owners.len()
    }

    pub fn dispatch_for(&self, execution_id: &Uuid) -> Option<Dispatch> {
        self.dispatches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(execution_id)
            .cloned()
    }
}
