//! Configuration types for adapters and the engine.
//!
//! - `ConnectionConfig`: pool sizing, timeouts, schema and read-only mode
//! - `EngineConfig`: paging, blacklist, ledger, uploads and reconciler settings
//!
//! # Security
//! These configuration structs intentionally do NOT store passwords or credentials.

mod connection;
mod engine;

pub use connection::ConnectionConfig;
pub use engine::EngineConfig;
