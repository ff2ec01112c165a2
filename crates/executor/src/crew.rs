//! Crew engine seam.
//!
//! The engine turns a stored [`Graph`] into a runnable [`Crew`]. Kickoff is
//! synchronous and may block for minutes, so callers run it on the blocking
//! pool.

use std::time::Duration;

use crewstream_core::Graph;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CrewError {
    #[error("graph translation failed: {0}")]
    Translation(String),

    #[error("crew kickoff failed: {0}")]
    Kickoff(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A runnable crew. `kickoff` blocks the calling thread.
pub trait Crew: Send + Sync {
    fn kickoff(&self, inputs: &Value) -> Result<Value, CrewError>;
}

pub trait CrewEngine: Send + Sync {
    fn translate(&self, graph: &Graph) -> Result<Box<dyn Crew>, CrewError>;
}

// ── Remote engine ────────────────────────────────────────────────

/// Runs crews on an external engine over HTTP.
///
/// `POST {base_url}/kickoff` with `{graph_id, definition, inputs}`; the
/// response body is the crew output.
#[derive(Debug, Clone)]
pub struct RemoteCrewEngine {
    base_url: String,
    timeout: Duration,
}

impl RemoteCrewEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CrewEngine for RemoteCrewEngine {
    fn translate(&self, graph: &Graph) -> Result<Box<dyn Crew>, CrewError> {
        if !graph.definition.is_object() {
            return Err(CrewError::Translation(format!(
                "graph {} has no definition object",
                graph.id
            )));
        }
        Ok(Box::new(RemoteCrew {
            url: format!("{}/kickoff", self.base_url),
            timeout: self.timeout,
            graph_id: graph.id.clone(),
            definition: graph.definition.clone(),
        }))
    }
}

struct RemoteCrew {
    url: String,
    timeout: Duration,
    graph_id: String,
    definition: Value,
}

impl Crew for RemoteCrew {
    fn kickoff(&self, inputs: &Value) -> Result<Value, CrewError> {
        // Built per call: a blocking client must not be created or dropped on
        // an async worker thread.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        debug!(graph_id = %self.graph_id, url = %self.url, "crew kickoff");
        let response = client
            .post(&self.url)
            .json(&json!({
                "graph_id": self.graph_id,
                "definition": self.definition,
                "inputs": inputs,
            }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CrewError::Kickoff(format!("engine returned {status}: {body}")));
        }
        Ok(response.json()?)
    }
}

// ── Disabled engine ──────────────────────────────────────────────

/// Used when no engine URL is configured. Every translation fails, so
/// executions end `failed` without retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCrewEngine;

impl CrewEngine for DisabledCrewEngine {
    fn translate(&self, graph: &Graph) -> Result<Box<dyn Crew>, CrewError> {
        Err(CrewError::Translation(format!(
            "no crew engine configured, cannot run graph {}",
            graph.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_engine_requires_object_definition() {
        let engine = RemoteCrewEngine::new("http://engine.local/", Duration::from_secs(5));
        assert_eq!(engine.base_url(), "http://engine.local");

        let ok = Graph::new("g1", "research", json!({"agents": []}));
        assert!(engine.translate(&ok).is_ok());

        let bad = Graph::new("g2", "empty", Value::Null);
        assert!(matches!(
            engine.translate(&bad),
            Err(CrewError::Translation(_))
        ));
    }

    #[test]
    fn disabled_engine_rejects_everything() {
        let graph = Graph::new("g1", "research", json!({}));
        let err = DisabledCrewEngine.translate(&graph).err().unwrap();
        assert!(err.to_string().contains("no crew engine configured"));
    }
}
