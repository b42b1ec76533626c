//! DuckDB engine module - construction, lifecycle and statement execution.
//!
//! This module provides:
//! - `EngineFactory`: opens in-memory engines with configured settings
//! - `EngineHandle`: the database instance, its connection and scratch space
//! - `Lifecycle`: single-flight initialization and ordered shutdown
//! - `QueryResult`: query execution results

pub mod connection;
mod factory;
pub mod lifecycle;

pub use connection::{EngineHandle, QueryResult};
pub use factory::EngineFactory;
pub use lifecycle::{Lifecycle, LifecycleState};
