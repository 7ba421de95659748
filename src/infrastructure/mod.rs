//! Infrastructure layer for the engine relay
//!
//! Postgres-backed configuration and usage stores, migrations and the
//! shared log message text.

pub mod database;
pub mod engine_store;
pub mod log_messages;
pub mod usage_store;

pub use database::*;
pub use engine_store::PostgresConfigStore;
pub use usage_store::PostgresUsageTracker;
