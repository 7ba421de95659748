//! Domain types and pure business logic for the engine relay
//!
//! Everything here is free of I/O: request validation, the cost model and
//! citation formatting can be exercised without a runtime.

pub mod chat;
pub mod citations;
pub mod config_types;
pub mod types;
pub mod usage;

pub use chat::*;
pub use types::*;
pub use usage::{Cost, PriceTable, UsageError, UsageSummary};
