//! In-process task queue.
//!
//! Each named queue has a priority heap and a fixed pool of worker tasks.
//! Higher priorities run first; equal priorities run in enqueue order. The
//! bookkeeping lives in memory and is lost on restart.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use crewstream_core::config::QueueConfig;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::TaskQueue;
use crate::error::QueueError;
use crate::handler::{TaskContext, TaskHandler};
use crate::ledger::Ledger;
use crate::task::{TaskId, TaskRecord, TaskRequest, TaskState};

// ── Lanes ─────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
struct Queued {
    priority: i32,
    seq: u64,
    id: TaskId,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct Lane {
    name: String,
    pending: Mutex<BinaryHeap<Queued>>,
    wake: Notify,
}

impl Lane {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pending: Mutex::new(BinaryHeap::new()),
            wake: Notify::new(),
        }
    }

    fn push(&self, item: Queued) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
        self.wake.notify_one();
    }

    fn pop(&self) -> Option<TaskId> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .map(|q| q.id)
    }

    fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ── Stats ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LaneStats {
    pub name: String,
    pub waiting: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QueueStats {
    pub queues: Vec<LaneStats>,
    pub workers: usize,
    pub running: usize,
    pub retrying: usize,
}

// ── Queue ─────────────────────────────────────────────────────

struct Inner {
    ledger: Arc<Ledger>,
    lanes: HashMap<String, Arc<Lane>>,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
    seq: AtomicU64,
    shutting_down: AtomicBool,
}

impl Inner {
    fn handler(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    async fn run(&self, id: TaskId) {
        let Some((name, args)) = self.ledger.claim(&id) else {
            debug!(task_id = %id, "skipping revoked task");
            return;
        };
        let Some(handler) = self.handler(&name) else {
            let err = QueueError::UnknownTask(name);
            error!(task_id = %id, error = %err, "task has no handler");
            self.ledger.finish(&id, Err((None, err.to_string())));
            return;
        };

        info!(task_id = %id, task = %name, "task started");
        let ctx = TaskContext::new(id, self.ledger.clone());
        let joined = tokio::spawn(async move { handler.run(ctx, args).await }).await;

        let outcome = match joined {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(failure)) => {
                warn!(task_id = %id, task = %name, error = %failure.message, "task failed");
                let traceback = failure.traceback.unwrap_or(failure.message);
                Err((failure.summary, traceback))
            }
            Err(e) => {
                let err = QueueError::Handler(format!("task aborted: {e}"));
                error!(task_id = %id, task = %name, error = %err, "task aborted");
                Err((None, err.to_string()))
            }
        };

        let state = self.ledger.finish(&id, outcome);
        info!(task_id = %id, task = %name, state = ?state, "task finished");
    }
}

/// Task queue backed by tokio tasks in this process.
pub struct LocalTaskQueue {
    inner: Arc<Inner>,
    concurrency: usize,
    result_ttl: Duration,
    workers: Mutex<Vec<JoinHandle<()>>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl LocalTaskQueue {
    pub fn new(config: &QueueConfig) -> Self {
        let lanes = config
            .names
            .iter()
            .map(|name| (name.clone(), Arc::new(Lane::new(name))))
            .collect();
        Self {
            inner: Arc::new(Inner {
                ledger: Arc::new(Ledger::default()),
                lanes,
                handlers: RwLock::new(HashMap::new()),
                seq: AtomicU64::new(0),
                shutting_down: AtomicBool::new(false),
            }),
            concurrency: config.concurrency.max(1),
            result_ttl: config.result_ttl(),
            workers: Mutex::new(Vec::new()),
            reaper: Mutex::new(None),
        }
    }

    /// Register the handler for tasks named `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let name = name.into();
        debug!(task = %name, "task handler registered");
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handler);
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.lanes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Spawn the worker pools. Returns `false` if they are already running.
    pub fn start(&self) -> bool {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.is_empty() {
            return false;
        }
        for lane in self.inner.lanes.values() {
            for worker in 0..self.concurrency {
                let inner = self.inner.clone();
                let lane = lane.clone();
                workers.push(tokio::spawn(worker_loop(inner, lane, worker)));
            }
        }
        *self.reaper.lock().unwrap_or_else(PoisonError::into_inner) = Some(tokio::spawn(
            reaper_loop(self.inner.ledger.clone(), self.result_ttl),
        ));
        info!(
            queues = self.inner.lanes.len(),
            concurrency = self.concurrency,
            result_ttl_secs = self.result_ttl.as_secs(),
            "task queue workers started"
        );
        true
    }

    /// Whether the ledger still holds a record for `id`.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.inner.ledger.get(id).is_some()
    }

    /// Drop finished records older than the result TTL. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.inner.ledger.purge_expired(self.result_ttl)
    }

    /// Stop accepting work and let workers finish their current task.
    ///
    /// Workers still busy after `grace` are aborted. Waiting tasks stay pending.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.shutting_down.store(true, Ordering::Release);
        for lane in self.inner.lanes.values() {
            lane.wake.notify_waiters();
        }

        if let Some(reaper) = self.reaper.lock().unwrap_or_else(PoisonError::into_inner).take() {
            reaper.abort();
        }

        let handles: Vec<_> = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0;
        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                aborted += 1;
            }
        }
        info!(aborted, "task queue shut down");
    }

    /// Wait until a task is ready and return its final record.
    pub async fn wait_for(&self, id: &TaskId, timeout: Duration) -> Result<TaskRecord, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.ledger.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.inner.ledger.get(id) {
                None => return Err(QueueError::UnknownTask(id.to_string())),
                Some(record) if record.state.is_ready() => return Ok(record),
                Some(_) => {}
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(QueueError::Timeout(timeout.as_millis() as u64));
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        let mut queues: Vec<_> = self
            .inner
            .lanes
            .values()
            .map(|lane| LaneStats {
                name: lane.name.clone(),
                waiting: lane.len(),
            })
            .collect();
        queues.sort_by(|a, b| a.name.cmp(&b.name));
        QueueStats {
            queues,
            workers: self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            running: self.inner.ledger.count(TaskState::Started),
            retrying: self.inner.ledger.count(TaskState::Retry),
        }
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskId, QueueError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(QueueError::ShuttingDown);
        }
        let lane = self
            .inner
            .lanes
            .get(&request.queue)
            .cloned()
            .ok_or_else(|| QueueError::UnknownQueue(request.queue.clone()))?;
        if self.inner.handler(&request.name).is_none() {
            return Err(QueueError::UnknownTask(request.name));
        }

        let id = Uuid::new_v4();
        let priority = request.priority;
        let name = request.name.clone();
        self.inner.ledger.insert(TaskRecord::pending(id, request));
        lane.push(Queued {
            priority,
            seq: self.inner.seq.fetch_add(1, Ordering::Relaxed),
            id,
        });

        info!(task_id = %id, task = %name, queue = %lane.name, priority, "task enqueued");
        Ok(id)
    }

    async fn status(&self, id: &TaskId) -> Option<TaskRecord> {
        self.inner.ledger.get(id)
    }

    async fn revoke(&self, id: &TaskId) -> Result<bool, QueueError> {
        let revoked = self.inner.ledger.revoke(id);
        if revoked {
            info!(task_id = %id, "task revoked");
        }
        Ok(revoked)
    }
}

/// Sweep interval: the TTL itself, kept between one second and one minute.
fn sweep_interval(ttl: Duration) -> Duration {
    ttl.clamp(Duration::from_secs(1), Duration::from_secs(60))
}

async fn reaper_loop(ledger: Arc<Ledger>, ttl: Duration) {
    let mut ticker = tokio::time::interval(sweep_interval(ttl));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let purged = ledger.purge_expired(ttl);
        if purged > 0 {
            debug!(purged, "expired task records dropped");
        }
    }
}

async fn worker_loop(inner: Arc<Inner>, lane: Arc<Lane>, worker: usize) {
    debug!(queue = %lane.name, worker, "worker started");
    loop {
        let notified = lane.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if inner.shutting_down.load(Ordering::Acquire) {
            break;
        }
        match lane.pop() {
            Some(id) => inner.run(id).await,
            None => notified.await,
        }
    }
    debug!(queue = %lane.name, worker, "worker stopped");
}
