pub mod config;
pub mod error;
pub mod execution;
pub mod graph;

pub use config::Config;
pub use error::*;
pub use execution::*;
pub use graph::*;
