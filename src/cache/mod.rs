//! Engine configuration lookup
//!
//! The [`PromptCache`] sits in front of a [`ConfigStore`] and keeps each
//! engine's configuration for a fixed TTL. Stores are pluggable: an
//! in-memory store fed from settings, or the Postgres store in
//! `infrastructure::engine_store`.

pub mod memory_store;
pub mod prompt_cache;

pub use memory_store::InMemoryConfigStore;
pub use prompt_cache::{CacheStats, PromptCache};

use crate::domain::{EngineConfig, EngineId};
use async_trait::async_trait;
use thiserror::Error;

/// Source of truth for engine configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch one engine's configuration; unknown ids are [`ConfigStoreError::NotFound`]
    async fn fetch_engine_config(&self, engine_id: &EngineId)
        -> Result<EngineConfig, ConfigStoreError>;
}

/// Configuration store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigStoreError {
    #[error("Engine not found: {0}")]
    NotFound(EngineId),

    #[error("Configuration store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed configuration for engine {engine_id}: {reason}")]
    Malformed { engine_id: EngineId, reason: String },
}
