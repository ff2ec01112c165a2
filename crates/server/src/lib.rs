//! HTTP surface for crewstream: event streams, execution dispatch and task
//! status, wired onto the realtime hub and the local task queue.

pub mod api;
pub mod auth;
pub mod router;
pub mod startup;
pub mod state;

pub use router::build_router;
pub use state::AppState;
