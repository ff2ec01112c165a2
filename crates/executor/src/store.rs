//! Persistence seam for executions and graphs.

use async_trait::async_trait;
use crewstream_core::{Execution, Graph};
use uuid::Uuid;

use crate::error::ExecutionError;

/// One unit of database work. Dropping the session releases it.
#[async_trait]
pub trait Session: Send {
    /// Insert a new execution. Fails if the id already exists.
    async fn create_execution(&mut self, execution: &Execution) -> Result<(), ExecutionError>;

    async fn get_execution(&mut self, id: &Uuid) -> Result<Option<Execution>, ExecutionError>;

    /// Overwrite the stored execution with `execution`.
    ///
    /// Fails with `NotFound` if it does not exist and with `Conflict` if the
    /// stored row is already terminal. Terminal rows are never rewritten.
    async fn update_execution(&mut self, execution: &Execution) -> Result<(), ExecutionError>;

    async fn get_graph(&mut self, id: &str) -> Result<Option<Graph>, ExecutionError>;
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn session(&self) -> Result<Box<dyn Session>, ExecutionError>;

    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;
}
