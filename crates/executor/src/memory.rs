//! In-memory database, seeded from a graphs file or in code.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use crewstream_core::{Execution, Graph};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::store::{Database, Session};

#[derive(Default)]
struct Tables {
    executions: HashMap<Uuid, Execution>,
    graphs: HashMap<String, Graph>,
}

/// Process-local tables behind an `RwLock`. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<RwLock<Tables>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graphs(graphs: impl IntoIterator<Item = Graph>) -> Self {
        let db = Self::new();
        for graph in graphs {
            db.insert_graph(graph);
        }
        db
    }

    /// Seed from a JSON array of graphs. A missing file yields an empty database.
    pub fn load(path: &Path) -> Result<Self, ExecutionError> {
        if !path.exists() {
            warn!(path = %path.display(), "graphs file not found, starting with no graphs");
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ExecutionError::Storage(format!("{}: {e}", path.display())))?;
        let graphs: Vec<Graph> = serde_json::from_str(&raw)
            .map_err(|e| ExecutionError::Storage(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), count = graphs.len(), "graphs loaded");
        Ok(Self::with_graphs(graphs))
    }

    pub fn insert_graph(&self, graph: Graph) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .graphs
            .insert(graph.id.clone(), graph);
    }

    pub fn execution(&self, id: &Uuid) -> Option<Execution> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .executions
            .get(id)
            .cloned()
    }

    /// Mutate a stored execution in place. Returns `false` if it does not exist.
    pub fn update_with(&self, id: &Uuid, f: impl FnOnce(&mut Execution)) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        match tables.executions.get_mut(id) {
            Some(execution) => {
                f(execution);
                true
            }
            None => false,
        }
    }

    /// Sessions handed out and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn session(&self) -> Result<Box<dyn Session>, ExecutionError> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            tables: self.tables.clone(),
            _lease: SessionLease(self.open_sessions.clone()),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct SessionLease(Arc<AtomicUsize>);

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemorySession {
    tables: Arc<RwLock<Tables>>,
    _lease: SessionLease,
}

#[async_trait]
impl Session for MemorySession {
    async fn create_execution(&mut self, execution: &Execution) -> Result<(), ExecutionError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.executions.contains_key(&execution.id) {
            return Err(ExecutionError::Storage(format!(
                "execution {} already exists",
                execution.id
            )));
        }
        tables.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&mut self, id: &Uuid) -> Result<Option<Execution>, ExecutionError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.executions.get(id).cloned())
    }

    async fn update_execution(&mut self, execution: &Execution) -> Result<(), ExecutionError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        match tables.executions.get_mut(&execution.id) {
            Some(stored) if stored.status.is_terminal() => {
                Err(ExecutionError::conflict(execution.id, stored.status))
            }
            Some(stored) => {
                *stored = execution.clone();
                Ok(())
            }
            None => Err(ExecutionError::not_found("execution", execution.id)),
        }
    }

    async fn get_graph(&mut self, id: &str) -> Result<Option<Graph>, ExecutionError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.graphs.get(id).cloned())
    }
}
