//! The `Execution` record: one crew run against a graph.
//!
//! Status moves forward only: `pending → running → {completed | failed}`,
//! with `cancelled` reachable from either non-terminal state.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` respects the forward-only lifecycle.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Fields supplied by the caller when work is queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExecution {
    pub id: Uuid,
    pub graph_id: String,
    pub user_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub trigger_message_id: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub inputs: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Execution {
    pub id: Uuid,
    pub graph_id: String,
    pub user_id: String,
    pub thread_id: Option<String>,
    pub trigger_message_id: Option<String>,
    pub status: ExecutionStatus,
    pub priority: i32,
    pub config: serde_json::Value,
    pub inputs: serde_json::Value,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub progress_percentage: f64,
    pub current_step: Option<String>,
    /// Crew invocations made so far.
    pub attempts: u32,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(new: NewExecution) -> Self {
        let now = Utc::now();
        Self {
            id: new.id,
            graph_id: new.graph_id,
            user_id: new.user_id,
            thread_id: new.thread_id,
            trigger_message_id: new.trigger_message_id,
            status: ExecutionStatus::Pending,
            priority: new.priority,
            config: new.config,
            inputs: new.inputs,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
            result: None,
            error_message: None,
            error_details: None,
            progress_percentage: 0.0,
            current_step: None,
            attempts: 0,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: ExecutionStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Running)?;
        self.started_at = Some(self.updated_at);
        self.current_step = Some("starting".to_string());
        Ok(())
    }

    pub fn complete(&mut self, result: serde_json::Value, elapsed: Duration) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Completed)?;
        self.completed_at = Some(self.updated_at);
        self.duration_seconds = Some(elapsed.as_secs_f64());
        self.result = Some(result);
        self.progress_percentage = 100.0;
        self.current_step = Some("completed".to_string());
        Ok(())
    }

    pub fn fail(
        &mut self,
        message: impl Into<String>,
        details: serde_json::Value,
        elapsed: Duration,
    ) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Failed)?;
        self.completed_at = Some(self.updated_at);
        self.duration_seconds = Some(elapsed.as_secs_f64());
        self.error_message = Some(message.into());
        self.error_details = Some(details);
        self.current_step = Some("failed".to_string());
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.transition(ExecutionStatus::Cancelled)?;
        self.completed_at = Some(self.updated_at);
        self.cancellation_reason = Some(reason.into());
        self.current_step = Some("cancelled".to_string());
        Ok(())
    }

    /// Record a failed attempt that will be retried. Status stays `running`.
    pub fn record_retry(&mut self, message: impl Into<String>, details: serde_json::Value) {
        self.error_message = Some(message.into());
        self.error_details = Some(details);
        self.current_step = Some("retrying".to_string());
        self.updated_at = Utc::now();
    }

    pub fn set_progress(&mut self, percentage: f64, step: impl Into<String>) {
        self.progress_percentage = percentage.clamp(0.0, 100.0);
        self.current_step = Some(step.into());
        self.updated_at = Utc::now();
    }
}
