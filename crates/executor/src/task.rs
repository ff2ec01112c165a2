//! The `execute_crew` task: one crew run from creation to a terminal status.
//!
//! The Execution row is created `running` before any external work, so a
//! crash mid-run still leaves a record. Transient crew failures are retried
//! in place up to `max_attempts` total; the status stays `running` and the
//! queue reports `retry` while the task waits out the backoff. Final failures
//! are recorded on the row and returned as a summary, never re-raised.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crewstream_core::config::ExecutorConfig;
use crewstream_core::{Execution, ExecutionStatus, NewExecution};
use crewstream_queue::{TaskContext, TaskFailure, TaskHandler};
use crewstream_realtime::EventSink;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::crew::{Crew, CrewEngine};
use crate::error::ExecutionError;
use crate::store::{Database, Session};

/// Outcome returned to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl From<&Execution> for ExecutionSummary {
    fn from(e: &Execution) -> Self {
        Self {
            execution_id: e.id,
            status: e.status,
            attempts: e.attempts,
            result: e.result.clone(),
            error_message: e.error_message.clone(),
            duration_seconds: e.duration_seconds,
        }
    }
}

/// Wrap crew output as `{"result": ...}`, unwrapping a top-level `raw` field.
pub fn normalize_result(output: Value) -> Value {
    match output {
        Value::Object(mut map) if map.contains_key("raw") => {
            let raw = map.remove("raw").unwrap_or(Value::Null);
            json!({ "result": raw })
        }
        other => json!({ "result": other }),
    }
}

pub struct ExecutionTask {
    database: Arc<dyn Database>,
    engine: Arc<dyn CrewEngine>,
    events: Arc<dyn EventSink>,
    max_attempts: u32,
    backoff: Duration,
    crew_timeout: Duration,
}

impl ExecutionTask {
    pub fn new(
        database: Arc<dyn Database>,
        engine: Arc<dyn CrewEngine>,
        events: Arc<dyn EventSink>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            database,
            engine,
            events,
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
            crew_timeout: config.crew_timeout(),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_crew_timeout(mut self, timeout: Duration) -> Self {
        self.crew_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run one execution to a terminal status.
    ///
    /// Errors only when the Execution row cannot be created or a storage call
    /// fails; crew failures come back as an `Ok` summary with status `failed`.
    pub async fn execute(
        &self,
        ctx: &TaskContext,
        new: NewExecution,
    ) -> Result<ExecutionSummary, ExecutionError> {
        let clock = Instant::now();
        let mut session = self.database.session().await?;

        let mut execution = Execution::new(new);
        execution.start()?;
        session.create_execution(&execution).await?;
        info!(
            execution_id = %execution.id,
            graph_id = %execution.graph_id,
            user_id = %execution.user_id,
            task_id = %ctx.task_id(),
            "execution started"
        );
        self.events.execution_status(&execution);

        let graph = match session.get_graph(&execution.graph_id).await {
            Ok(Some(graph)) => graph,
            Ok(None) => {
                let err = ExecutionError::not_found("graph", &execution.graph_id);
                return self.fail(&mut *session, execution, err, clock).await;
            }
            Err(err) => return self.fail(&mut *session, execution, err, clock).await,
        };

        let crew: Arc<dyn Crew> = match self.engine.translate(&graph) {
            Ok(crew) => Arc::from(crew),
            Err(e) => {
                let err = ExecutionError::Validation(e.to_string());
                return self.fail(&mut *session, execution, err, clock).await;
            }
        };

        loop {
            if let Some(summary) = self.check_cancelled(&mut *session, ctx, &execution).await? {
                return Ok(summary);
            }

            execution.attempts += 1;
            let attempt = execution.attempts;
            execution.set_progress(10.0, "running crew");
            if let Some(summary) = self.persist(&mut *session, &execution).await? {
                return Ok(summary);
            }
            let note = format!("attempt {attempt} of {}", self.max_attempts);
            self.events.execution_progress(
                &execution,
                execution.progress_percentage,
                "running crew",
                Some(note.as_str()),
            );

            let outcome = self.kickoff(crew.clone(), execution.inputs.clone()).await;

            if let Some(summary) = self.check_cancelled(&mut *session, ctx, &execution).await? {
                return Ok(summary);
            }

            match outcome {
                Ok(output) => {
                    execution.complete(normalize_result(output), clock.elapsed())?;
                    if let Some(summary) = self.persist(&mut *session, &execution).await? {
                        return Ok(summary);
                    }
                    info!(
                        execution_id = %execution.id,
                        attempts = attempt,
                        duration_seconds = ?execution.duration_seconds,
                        "execution completed"
                    );
                    self.events.execution_status(&execution);
                    self.events.execution_complete(&execution);
                    return Ok(ExecutionSummary::from(&execution));
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        execution_id = %execution.id,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "crew attempt failed, retrying"
                    );
                    execution.record_retry(err.to_string(), error_details(&err, attempt));
                    if let Some(summary) = self.persist(&mut *session, &execution).await? {
                        return Ok(summary);
                    }
                    ctx.mark_retry(json!({
                        "execution_id": execution.id,
                        "attempt": attempt,
                        "max_attempts": self.max_attempts,
                        "last_error": err.to_string(),
                    }));
                    self.events.execution_status(&execution);

                    tokio::time::sleep(self.backoff).await;
                    ctx.mark_started();
                }
                Err(err) => return self.fail(&mut *session, execution, err, clock).await,
            }
        }
    }

    /// Run the blocking crew call under the timeout. A panic, an error, or
    /// a timeout all surface as transient errors.
    async fn kickoff(&self, crew: Arc<dyn Crew>, inputs: Value) -> Result<Value, ExecutionError> {
        let call = tokio::task::spawn_blocking(move || crew.kickoff(&inputs));
        match tokio::time::timeout(self.crew_timeout, call).await {
            Err(_) => Err(ExecutionError::Timeout(self.crew_timeout.as_secs())),
            Ok(Err(join)) => Err(ExecutionError::TransientExecution(format!(
                "crew panicked: {join}"
            ))),
            Ok(Ok(Err(e))) => Err(ExecutionError::TransientExecution(e.to_string())),
            Ok(Ok(Ok(output))) => Ok(output),
        }
    }

    /// Reload the row. Returns a summary if the run must stop: the row was
    /// cancelled elsewhere, or the queue task was revoked.
    async fn check_cancelled(
        &self,
        session: &mut dyn Session,
        ctx: &TaskContext,
        current: &Execution,
    ) -> Result<Option<ExecutionSummary>, ExecutionError> {
        let stored = session
            .get_execution(&current.id)
            .await?
            .ok_or_else(|| ExecutionError::not_found("execution", current.id))?;

        if stored.status.is_terminal() {
            info!(execution_id = %stored.id, status = %stored.status, "execution finished elsewhere, stopping");
            return Ok(Some(ExecutionSummary::from(&stored)));
        }
        if !ctx.is_revoked() {
            return Ok(None);
        }

        let mut cancelled = stored;
        cancelled.cancel("task revoked")?;
        if let Some(summary) = self.persist(session, &cancelled).await? {
            return Ok(Some(summary));
        }
        info!(execution_id = %cancelled.id, "task revoked, execution cancelled");
        self.events.execution_status(&cancelled);
        Ok(Some(ExecutionSummary::from(&cancelled)))
    }

    /// Write the row. If another writer already moved it to a terminal
    /// status, the stored row wins and its summary is returned instead.
    async fn persist(
        &self,
        session: &mut dyn Session,
        execution: &Execution,
    ) -> Result<Option<ExecutionSummary>, ExecutionError> {
        match session.update_execution(execution).await {
            Ok(()) => Ok(None),
            Err(ExecutionError::Conflict { status, .. }) => {
                info!(execution_id = %execution.id, %status, "execution finished elsewhere, write dropped");
                let stored = session
                    .get_execution(&execution.id)
                    .await?
                    .ok_or_else(|| ExecutionError::not_found("execution", execution.id))?;
                Ok(Some(ExecutionSummary::from(&stored)))
            }
            Err(e) => Err(e),
        }
    }

    async fn fail(
        &self,
        session: &mut dyn Session,
        mut execution: Execution,
        err: ExecutionError,
        clock: Instant,
    ) -> Result<ExecutionSummary, ExecutionError> {
        let details = error_details(&err, execution.attempts);
        execution.fail(err.to_string(), details, clock.elapsed())?;
        if let Some(summary) = self.persist(session, &execution).await? {
            return Ok(summary);
        }
        error!(
            execution_id = %execution.id,
            attempts = execution.attempts,
            kind = err.kind(),
            error = %err,
            "execution failed"
        );
        self.events.execution_status(&execution);
        self.events.execution_error(&execution);
        Ok(ExecutionSummary::from(&execution))
    }
}

fn error_details(err: &ExecutionError, attempt: u32) -> Value {
    json!({
        "attempt": attempt,
        "kind": err.kind(),
        "error": err.to_string(),
        "trace": format!("{err:?}"),
    })
}

#[async_trait]
impl TaskHandler for ExecutionTask {
    async fn run(&self, ctx: TaskContext, args: Value) -> Result<Value, TaskFailure> {
        let new: NewExecution = serde_json::from_value(args)
            .map_err(|e| TaskFailure::new(format!("invalid execute_crew arguments: {e}")))?;

        match self.execute(&ctx, new).await {
            Ok(summary) if summary.status == ExecutionStatus::Failed => {
                let message = summary
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "execution failed".to_string());
                let summary = serde_json::to_value(&summary).unwrap_or(Value::Null);
                Err(TaskFailure::new(message.clone())
                    .with_traceback(message)
                    .with_summary(summary))
            }
            Ok(summary) => Ok(serde_json::to_value(&summary).unwrap_or(Value::Null)),
            Err(e) => Err(TaskFailure::new(e.to_string()).with_traceback(format!("{e:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crewstream_core::Graph;
    use crewstream_realtime::event::{ExecutionStatusUpdate, ExecutionProgress};
    use crewstream_realtime::{Event, EventType};

    use crate::crew::CrewError;
    use crate::memory::MemoryDatabase;

    type Hook = Arc<dyn Fn(usize) + Send + Sync>;

    /// Fails the first `fail_times` calls, then returns `output`.
    struct ScriptedCrew {
        calls: Arc<AtomicUsize>,
        fail_times: usize,
        output: Value,
        delay: Duration,
        hook: Option<Hook>,
    }

    impl Crew for ScriptedCrew {
        fn kickoff(&self, _inputs: &Value) -> Result<Value, CrewError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(hook) = &self.hook {
                hook(call);
            }
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            if call <= self.fail_times {
                return Err(CrewError::Kickoff(format!("boom #{call}")));
            }
            Ok(self.output.clone())
        }
    }

    struct ScriptedEngine {
        calls: Arc<AtomicUsize>,
        fail_times: usize,
        output: Value,
        delay: Duration,
        hook: Option<Hook>,
        reject: bool,
    }

    impl ScriptedEngine {
        fn new(fail_times: usize, output: Value) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail_times,
                output,
                delay: Duration::ZERO,
                hook: None,
                reject: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CrewEngine for ScriptedEngine {
        fn translate(&self, graph: &Graph) -> Result<Box<dyn Crew>, CrewError> {
            if self.reject {
                return Err(CrewError::Translation(format!("bad graph {}", graph.id)));
            }
            Ok(Box::new(ScriptedCrew {
                calls: self.calls.clone(),
                fail_times: self.fail_times,
                output: self.output.clone(),
                delay: self.delay,
                hook: self.hook.clone(),
            }))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn of_type(&self, kind: EventType) -> Vec<Event> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.event == kind)
                .cloned()
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn publish(&self, _user_id: &str, event: Event) -> usize {
            self.events.lock().unwrap().push(event);
            1
        }
    }

    struct Harness {
        db: MemoryDatabase,
        engine: Arc<ScriptedEngine>,
        sink: Arc<RecordingSink>,
        task: ExecutionTask,
    }

    fn harness(engine: ScriptedEngine) -> Harness {
        let db = MemoryDatabase::with_graphs([Graph::new("g1", "research", json!({"agents": []}))]);
        let engine = Arc::new(engine);
        let sink = Arc::new(RecordingSink::default());
        let task = ExecutionTask::new(
            Arc::new(db.clone()),
            engine.clone(),
            sink.clone(),
            &ExecutorConfig::default(),
        )
        .with_backoff(Duration::ZERO);
        Harness {
            db,
            engine,
            sink,
            task,
        }
    }

    fn request(graph_id: &str) -> NewExecution {
        NewExecution {
            id: Uuid::new_v4(),
            graph_id: graph_id.into(),
            user_id: "u1".into(),
            thread_id: Some("t1".into()),
            trigger_message_id: None,
            priority: 0,
            config: json!({}),
            inputs: json!({"topic": "rust"}),
        }
    }

    #[test]
    fn normalize_unwraps_raw_and_wraps_everything_else() {
        assert_eq!(normalize_result(json!({"raw": "hello"})), json!({"result": "hello"}));
        assert_eq!(normalize_result(json!("plain")), json!({"result": "plain"}));
        assert_eq!(normalize_result(json!({"a": 1})), json!({"result": {"a": 1}}));
        assert_eq!(normalize_result(json!(42)), json!({"result": 42}));
    }

    #[tokio::test]
    async fn raw_output_is_normalized_and_timed() {
        let h = harness(ScriptedEngine::new(0, json!({"raw": "hello"})));
        let new = request("g1");
        let id = new.id;

        let summary = h.task.execute(&TaskContext::detached(), new).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Completed);

        let stored = h.db.execution(&id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert_eq!(stored.result, Some(json!({"result": "hello"})));
        assert!(stored.duration_seconds.unwrap() > 0.0);
        assert_eq!(stored.progress_percentage, 100.0);
        assert!(stored.completed_at.is_some());
        assert_eq!(h.db.open_sessions(), 0);

        assert_eq!(h.sink.of_type(EventType::ExecutionComplete).len(), 1);
        assert!(h.sink.of_type(EventType::ExecutionStart).is_empty());
    }

    #[tokio::test]
    async fn two_failures_then_success_completes_on_third_attempt() {
        let h = harness(ScriptedEngine::new(2, json!("done")));
        let new = request("g1");
        let id = new.id;

        let summary = h.task.execute(&TaskContext::detached(), new).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Completed);
        assert_eq!(summary.attempts, 3);
        assert_eq!(h.engine.calls(), 3);

        let stored = h.db.execution(&id).unwrap();
        assert_eq!(stored.attempts, 3);
        assert_eq!(stored.result, Some(json!({"result": "done"})));

        let retries: Vec<ExecutionStatusUpdate> = h
            .sink
            .of_type(EventType::ExecutionStatus)
            .iter()
            .map(|e| e.decode().unwrap())
            .filter(|s: &ExecutionStatusUpdate| s.current_step.as_deref() == Some("retrying"))
            .collect();
        assert_eq!(retries.len(), 2);
        assert!(retries.iter().all(|s| s.status == ExecutionStatus::Running));

        let progress: Vec<ExecutionProgress> = h
            .sink
            .of_type(EventType::ExecutionProgress)
            .iter()
            .map(|e| e.decode().unwrap())
            .collect();
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[2].message.as_deref(), Some("attempt 3 of 3"));
    }

    #[tokio::test]
    async fn persistent_failure_fails_after_max_attempts() {
        let h = harness(ScriptedEngine::new(usize::MAX, json!(null)));
        let new = request("g1");
        let id = new.id;

        let summary = h.task.execute(&TaskContext::detached(), new).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Failed);
        assert_eq!(h.engine.calls(), 3);

        let stored = h.db.execution(&id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert_eq!(stored.attempts, 3);
        assert!(stored.error_message.unwrap().contains("boom #3"));
        assert_eq!(stored.error_details.unwrap()["kind"], "transient_execution");
        assert!(stored.completed_at.is_some());
        assert_eq!(h.db.open_sessions(), 0);
        assert_eq!(h.sink.of_type(EventType::ExecutionError).len(), 1);
    }

    #[tokio::test]
    async fn missing_graph_fails_without_retry() {
        let h = harness(ScriptedEngine::new(0, json!("unused")));
        let new = request("nope");
        let id = new.id;

        let summary = h.task.execute(&TaskContext::detached(), new).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Failed);
        assert_eq!(h.engine.calls(), 0);

        let stored = h.db.execution(&id).unwrap();
        assert_eq!(stored.attempts, 0);
        assert_eq!(stored.error_details.unwrap()["kind"], "not_found");
        assert_eq!(h.db.open_sessions(), 0);

        let errors = h.sink.of_type(EventType::ExecutionError);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].data["error_message"], "graph not found: nope");
    }

    #[tokio::test]
    async fn translation_error_is_not_retried() {
        let mut engine = ScriptedEngine::new(0, json!("unused"));
        engine.reject = true;
        let h = harness(engine);

        let summary = h.task.execute(&TaskContext::detached(), request("g1")).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Failed);
        assert_eq!(summary.attempts, 0);
        assert!(summary.error_message.unwrap().starts_with("validation error"));
    }

    #[tokio::test]
    async fn stalled_crew_times_out_as_transient() {
        let mut engine = ScriptedEngine::new(0, json!("late"));
        engine.delay = Duration::from_millis(300);
        let mut h = harness(engine);
        h.task = h.task.with_crew_timeout(Duration::from_millis(20));
        let new = request("g1");
        let id = new.id;

        let summary = h.task.execute(&TaskContext::detached(), new).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Failed);
        assert_eq!(summary.attempts, 3);
        let stored = h.db.execution(&id).unwrap();
        assert_eq!(stored.error_details.unwrap()["kind"], "timeout");
    }

    #[tokio::test]
    async fn cancellation_during_crew_call_is_preserved() {
        let db_slot: Arc<Mutex<Option<(MemoryDatabase, Uuid)>>> = Arc::new(Mutex::new(None));
        let slot = db_slot.clone();
        let mut engine = ScriptedEngine::new(0, json!("ignored"));
        engine.hook = Some(Arc::new(move |_call| {
            if let Some((db, id)) = slot.lock().unwrap().as_ref() {
                db.update_with(id, |e| {
                    e.cancel("user requested").unwrap();
                });
            }
        }));
        let h = harness(engine);
        let new = request("g1");
        let id = new.id;
        *db_slot.lock().unwrap() = Some((h.db.clone(), id));

        let summary = h.task.execute(&TaskContext::detached(), new).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Cancelled);
        assert_eq!(h.engine.calls(), 1);

        let stored = h.db.execution(&id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Cancelled);
        assert_eq!(stored.cancellation_reason.as_deref(), Some("user requested"));
        assert!(stored.result.is_none());
        assert!(h.sink.of_type(EventType::ExecutionComplete).is_empty());
        assert_eq!(h.db.open_sessions(), 0);
    }

    /// Cancels the row on the read that follows the crew call, after the
    /// worker has already decided the run is still live.
    struct CancelAfterCheck {
        inner: Box<dyn Session>,
        db: MemoryDatabase,
        reads: usize,
    }

    #[async_trait]
    impl Session for CancelAfterCheck {
        async fn create_execution(&mut self, e: &Execution) -> Result<(), ExecutionError> {
            self.inner.create_execution(e).await
        }

        async fn get_execution(&mut self, id: &Uuid) -> Result<Option<Execution>, ExecutionError> {
            let row = self.inner.get_execution(id).await;
            self.reads += 1;
            // Read 1 precedes kickoff, read 2 follows it.
            if self.reads == 2 {
                self.db.update_with(id, |e| {
                    e.cancel("user requested").unwrap();
                });
            }
            row
        }

        async fn update_execution(&mut self, e: &Execution) -> Result<(), ExecutionError> {
            self.inner.update_execution(e).await
        }

        async fn get_graph(&mut self, id: &str) -> Result<Option<Graph>, ExecutionError> {
            self.inner.get_graph(id).await
        }
    }

    struct RacingDatabase(MemoryDatabase);

    #[async_trait]
    impl Database for RacingDatabase {
        async fn session(&self) -> Result<Box<dyn Session>, ExecutionError> {
            Ok(Box::new(CancelAfterCheck {
                inner: self.0.session().await?,
                db: self.0.clone(),
                reads: 0,
            }))
        }

        fn name(&self) -> &'static str {
            "racing"
        }
    }

    #[tokio::test]
    async fn cancel_racing_completion_is_not_overwritten() {
        let db = MemoryDatabase::with_graphs([Graph::new("g1", "research", json!({"agents": []}))]);
        let engine = Arc::new(ScriptedEngine::new(0, json!("finished")));
        let sink = Arc::new(RecordingSink::default());
        let task = ExecutionTask::new(
            Arc::new(RacingDatabase(db.clone())),
            engine.clone(),
            sink.clone(),
            &ExecutorConfig::default(),
        );
        let new = request("g1");
        let id = new.id;

        let summary = task.execute(&TaskContext::detached(), new).await.unwrap();
        assert_eq!(summary.status, ExecutionStatus::Cancelled);
        assert_eq!(engine.calls(), 1);

        let stored = db.execution(&id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Cancelled);
        assert_eq!(stored.cancellation_reason.as_deref(), Some("user requested"));
        assert!(stored.result.is_none());
        assert!(sink.of_type(EventType::ExecutionComplete).is_empty());
        assert_eq!(db.open_sessions(), 0);
    }

    #[tokio::test]
    async fn handler_reports_failed_summary_as_task_failure() {
        let h = harness(ScriptedEngine::new(0, json!("unused")));
        let args = serde_json::to_value(request("missing")).unwrap();

        let failure = h.task.run(TaskContext::detached(), args).await.unwrap_err();
        assert_eq!(failure.message, "graph not found: missing");
        assert_eq!(failure.summary.unwrap()["status"], "failed");

        let bad = h.task.run(TaskContext::detached(), json!({"nope": 1})).await.unwrap_err();
        assert!(bad.message.starts_with("invalid execute_crew arguments"));
    }
}
