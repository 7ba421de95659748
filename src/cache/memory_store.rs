//! Configuration store backed by a fixed engine table

use crate::cache::{ConfigStore, ConfigStoreError};
use crate::domain::{EngineConfig, EngineId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Engine configurations loaded once, typically from the `engines` settings section
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigStore {
    engines: HashMap<EngineId, EngineConfig>,
}

impl InMemoryConfigStore {
    pub fn new(engines: impl IntoIterator<Item = EngineConfig>) -> Self {
        Self {
            engines: engines
                .into_iter()
                .map(|config| (config.engine_id.clone(), config))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn fetch_engine_config(
        &self,
        engine_id: &EngineId,
    ) -> Result<EngineConfig, ConfigStoreError> {
        self.engines
            .get(engine_id)
            .cloned()
            .ok_or_else(|| ConfigStoreError::NotFound(engine_id.clone()))
    }
}
