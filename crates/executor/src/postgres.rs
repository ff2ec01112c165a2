//! PostgreSQL database backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crewstream_core::config::PostgresConfig;
use crewstream_core::{Execution, Graph};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tracing::info;
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::store::{Database, Session};

const EXECUTION_COLUMNS: &str = "id, graph_id, user_id, thread_id, trigger_message_id, status, priority,
     config, inputs, started_at, completed_at, duration_seconds, result, error_message,
     error_details, progress_percentage, current_step, attempts, cancellation_reason,
     created_at, updated_at";

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect and apply pending migrations.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, ExecutionError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;
        info!(host = %config.host, database = %config.database, "PostgreSQL connected");

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| ExecutionError::Storage(format!("migrations failed: {e}")))?;
        info!("database migrations applied");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn session(&self) -> Result<Box<dyn Session>, ExecutionError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Holds one pooled connection; dropping it returns the connection to the pool.
struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: Uuid,
    graph_id: String,
    user_id: String,
    thread_id: Option<String>,
    trigger_message_id: Option<String>,
    status: String,
    priority: i32,
    config: serde_json::Value,
    inputs: serde_json::Value,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    duration_seconds: Option<f64>,
    result: Option<serde_json::Value>,
    error_message: Option<String>,
    error_details: Option<serde_json::Value>,
    progress_percentage: f64,
    current_step: Option<String>,
    attempts: i32,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExecutionRow> for Execution {
    type Error = ExecutionError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        Ok(Execution {
            id: row.id,
            graph_id: row.graph_id,
            user_id: row.user_id,
            thread_id: row.thread_id,
            trigger_message_id: row.trigger_message_id,
            status: row.status.parse()?,
            priority: row.priority,
            config: row.config,
            inputs: row.inputs,
            started_at: row.started_at,
            completed_at: row.completed_at,
            duration_seconds: row.duration_seconds,
            result: row.result,
            error_message: row.error_message,
            error_details: row.error_details,
            progress_percentage: row.progress_percentage,
            current_step: row.current_step,
            attempts: row.attempts.max(0) as u32,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GraphRow {
    id: String,
    name: String,
    definition: serde_json::Value,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl Session for PgSession {
    async fn create_execution(&mut self, e: &Execution) -> Result<(), ExecutionError> {
        sqlx::query(&format!(
            "INSERT INTO executions ({EXECUTION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                     $17, $18, $19, $20, $21)"
        ))
        .bind(e.id)
        .bind(&e.graph_id)
        .bind(&e.user_id)
        .bind(&e.thread_id)
        .bind(&e.trigger_message_id)
        .bind(e.status.as_str())
        .bind(e.priority)
        .bind(&e.config)
        .bind(&e.inputs)
        .bind(e.started_at)
        .bind(e.completed_at)
        .bind(e.duration_seconds)
        .bind(&e.result)
        .bind(&e.error_message)
        .bind(&e.error_details)
        .bind(e.progress_percentage)
        .bind(&e.current_step)
        .bind(e.attempts as i32)
        .bind(&e.cancellation_reason)
        .bind(e.created_at)
        .bind(e.updated_at)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    async fn get_execution(&mut self, id: &Uuid) -> Result<Option<Execution>, ExecutionError> {
        let row = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        row.map(Execution::try_from).transpose()
    }

    async fn update_execution(&mut self, e: &Execution) -> Result<(), ExecutionError> {
        let result = sqlx::query(
            "UPDATE executions SET
                status = $2, started_at = $3, completed_at = $4, duration_seconds = $5,
                result = $6, error_message = $7, error_details = $8,
                progress_percentage = $9, current_step = $10, attempts = $11,
                cancellation_reason = $12, updated_at = $13
             WHERE id = $1 AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(e.id)
        .bind(e.status.as_str())
        .bind(e.started_at)
        .bind(e.completed_at)
        .bind(e.duration_seconds)
        .bind(&e.result)
        .bind(&e.error_message)
        .bind(&e.error_details)
        .bind(e.progress_percentage)
        .bind(&e.current_step)
        .bind(e.attempts as i32)
        .bind(&e.cancellation_reason)
        .bind(e.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            // Either missing or already terminal.
            return match self.get_execution(&e.id).await? {
                Some(stored) => Err(ExecutionError::conflict(e.id, stored.status)),
                None => Err(ExecutionError::not_found("execution", e.id)),
            };
        }
        Ok(())
    }

    async fn get_graph(&mut self, id: &str) -> Result<Option<Graph>, ExecutionError> {
        let row = sqlx::query_as::<_, GraphRow>(
            "SELECT id, name, definition, created_at FROM graphs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(|r| Graph {
            id: r.id,
            name: r.name,
            definition: r.definition,
            created_at: r.created_at,
        }))
    }
}
