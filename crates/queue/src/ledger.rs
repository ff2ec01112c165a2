//! In-memory task bookkeeping shared by the queue and its workers.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::Notify;

use crate::task::{TaskId, TaskRecord, TaskState};

#[derive(Default)]
pub(crate) struct Ledger {
    records: RwLock<HashMap<TaskId, TaskRecord>>,
    /// Woken whenever a task reaches a ready state.
    pub(crate) finished: Notify,
}

impl Ledger {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, TaskRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, TaskRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, record: TaskRecord) {
        self.write().insert(record.id, record);
    }

    pub(crate) fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.read().get(id).cloned()
    }

    pub(crate) fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.read().get(id).map(|r| r.state)
    }

    /// Move a pending task to `started`. Returns its name and args, or `None`
    /// if it was revoked while waiting.
    pub(crate) fn claim(&self, id: &TaskId) -> Option<(String, serde_json::Value)> {
        let mut records = self.write();
        let record = records.get_mut(id)?;
        if record.state != TaskState::Pending {
            return None;
        }
        record.state = TaskState::Started;
        record.started_at = Some(Utc::now());
        Some((record.name.clone(), record.args.clone()))
    }

    /// Set a running task's state and meta. Ignored once the task is ready.
    pub(crate) fn mark(&self, id: &TaskId, state: TaskState, meta: Option<serde_json::Value>) {
        if let Some(record) = self.write().get_mut(id) {
            if record.state.is_ready() {
                return;
            }
            record.state = state;
            if meta.is_some() {
                record.meta = meta;
            }
        }
    }

    /// Record the final outcome. A revoked task keeps its `revoked` state.
    pub(crate) fn finish(
        &self,
        id: &TaskId,
        outcome: Result<serde_json::Value, (Option<serde_json::Value>, String)>,
    ) -> Option<TaskState> {
        let state = {
            let mut records = self.write();
            let record = records.get_mut(id)?;
            record.completed_at = Some(Utc::now());
            match outcome {
                Ok(result) => {
                    record.result = Some(result);
                    if record.state != TaskState::Revoked {
                        record.state = TaskState::Success;
                    }
                }
                Err((summary, traceback)) => {
                    record.result = summary;
                    record.traceback = Some(traceback);
                    if record.state != TaskState::Revoked {
                        record.state = TaskState::Failure;
                    }
                }
            }
            record.state
        };
        self.finished.notify_waiters();
        Some(state)
    }

    /// Flag a task as revoked. Returns `false` for unknown or ready tasks.
    pub(crate) fn revoke(&self, id: &TaskId) -> bool {
        let revoked = {
            let mut records = self.write();
            match records.get_mut(id) {
                Some(record) if !record.state.is_ready() => {
                    let was_pending = record.state == TaskState::Pending;
                    record.state = TaskState::Revoked;
                    if was_pending {
                        record.completed_at = Some(Utc::now());
                    }
                    true
                }
                _ => false,
            }
        };
        if revoked {
            self.finished.notify_waiters();
        }
        revoked
    }

    /// Drop ready records that finished more than `ttl` ago. Returns how many went.
    pub(crate) fn purge_expired(&self, ttl: std::time::Duration) -> usize {
        let cutoff = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        let mut records = self.write();
        let before = records.len();
        records.retain(|_, record| {
            match (record.state.is_ready(), record.completed_at, cutoff) {
                (true, Some(done), Some(cutoff)) => done > cutoff,
                _ => true,
            }
        });
        before - records.len()
    }

    pub(crate) fn count(&self, state: TaskState) -> usize {
        self.read().values().filter(|r| r.state == state).count()
    }
}
