//! Read-only task status lookup.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::TaskQueue;
use crate::task::TaskStatusReport;

/// Answers status questions from the queue's bookkeeping alone.
///
/// Never fails: malformed and unseen ids both report `"unknown"`.
#[derive(Clone)]
pub struct TaskStatusQuery {
    queue: Arc<dyn TaskQueue>,
}

impl TaskStatusQuery {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    pub async fn get_status(&self, task_id: &str) -> TaskStatusReport {
        let Ok(id) = Uuid::parse_str(task_id) else {
            return TaskStatusReport::unknown(task_id);
        };
        match self.queue.status(&id).await {
            Some(record) => TaskStatusReport::from(&record),
            None => TaskStatusReport::unknown(task_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use crewstream_core::config::QueueConfig;
    use serde_json::{json, Value};

    use crate::handler::{TaskContext, TaskFailure, TaskHandler};
    use crate::local::LocalTaskQueue;
    use crate::task::TaskRequest;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn run(&self, _ctx: TaskContext, args: Value) -> Result<Value, TaskFailure> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn unknown_ids_report_unknown() {
        let queue = Arc::new(LocalTaskQueue::new(&QueueConfig::default()));
        let query = TaskStatusQuery::new(queue);

        let report = query.get_status(&Uuid::new_v4().to_string()).await;
        assert_eq!(report.status, "unknown");
        assert!(report.result.is_none());

        let report = query.get_status("not-a-uuid").await;
        assert!(report.is_unknown());
        assert_eq!(report.id, "not-a-uuid");
    }

    #[tokio::test(start_paused = true)]
    async fn reports_pending_then_success() {
        let queue = Arc::new(LocalTaskQueue::new(&QueueConfig::default()));
        queue.register("echo", Arc::new(Echo));
        let query = TaskStatusQuery::new(queue.clone());

        let id = queue
            .enqueue(TaskRequest::new("echo", json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(query.get_status(&id.to_string()).await.status, "pending");

        queue.start();
        queue.wait_for(&id, Duration::from_secs(5)).await.unwrap();

        let report = query.get_status(&id.to_string()).await;
        assert_eq!(report.status, "success");
        assert_eq!(report.result, Some(json!({"x": 1})));
        assert!(report.completed_at.is_some());
        assert!(report.traceback.is_none());
    }
}
