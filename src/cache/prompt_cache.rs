//! Read-through, TTL-bounded engine configuration cache

use crate::cache::{ConfigStore, ConfigStoreError};
use crate::domain::{EngineConfig, EngineId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
struct CacheEntry {
    config: Arc<EngineConfig>,
    fetched_at: Instant,
    fetched_at_utc: DateTime<Utc>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// Snapshot of the cache contents for observability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub expired_count: usize,
    pub total_size_bytes: usize,
    pub engine_ids: Vec<EngineId>,
    pub oldest_fetch: Option<DateTime<Utc>>,
}

/// Process-wide engine configuration cache
///
/// Constructed once and shared by reference with every relay session.
/// Expiry is decided lazily on read; nothing runs in the background.
/// The lock is only ever held for map access, never across a store fetch,
/// so concurrent misses on one key may both fetch and the last write wins.
pub struct PromptCache {
    store: Arc<dyn ConfigStore>,
    ttl: Duration,
    entries: RwLock<HashMap<EngineId, CacheEntry>>,
}

impl PromptCache {
    pub fn new(store: Arc<dyn ConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the engine's configuration, fetching it on a miss or expiry
    ///
    /// A failed fetch leaves the cache untouched and is returned to this
    /// caller only.
    #[instrument(skip_all, fields(engine_id = %engine_id))]
    pub async fn get(&self, engine_id: &EngineId) -> Result<Arc<EngineConfig>, ConfigStoreError> {
        if let Some(config) = self.lookup_live(engine_id) {
            debug!("prompt cache hit");
            return Ok(config);
        }

        debug!("prompt cache miss, fetching from configuration store");
        let config = Arc::new(self.store.fetch_engine_config(engine_id).await?);

        let entry = CacheEntry {
            config: Arc::clone(&config),
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        };
        self.entries.write().insert(engine_id.clone(), entry);

        Ok(config)
    }

    fn lookup_live(&self, engine_id: &EngineId) -> Option<Arc<EngineConfig>> {
        let now = Instant::now();
        self.entries
            .read()
            .get(engine_id)
            .filter(|entry| entry.is_live(now, self.ttl))
            .map(|entry| Arc::clone(&entry.config))
    }

    /// When the stored entry for `engine_id` was fetched, live or not
    pub fn fetched_at(&self, engine_id: &EngineId) -> Option<Instant> {
        self.entries.read().get(engine_id).map(|e| e.fetched_at)
    }

    /// Remove one entry; returns whether it was present
    pub fn clear(&self, engine_id: &EngineId) -> bool {
        let removed = self.entries.write().remove(engine_id).is_some();
        debug!(engine_id = %engine_id, removed, "prompt cache entry cleared");
        removed
    }

    /// Remove every entry; returns how many were dropped
    pub fn clear_all(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        debug!(count, "prompt cache cleared");
        count
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read();

        let mut engine_ids: Vec<EngineId> = entries.keys().cloned().collect();
        engine_ids.sort();

        let total_size_bytes = entries
            .values()
            .map(|e| serde_json::to_vec(e.config.as_ref()).map_or(0, |bytes| bytes.len()))
            .sum();

        CacheStats {
            entry_count: entries.len(),
            expired_count: entries
                .values()
                .filter(|e| !e.is_live(now, self.ttl))
                .count(),
            total_size_bytes,
            engine_ids,
            oldest_fetch: entries.values().map(|e| e.fetched_at_utc).min(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::test_support::CountingConfigStore;

    fn engine(id: &str) -> EngineId {
        EngineId::try_new(id.to_string()).unwrap()
    }

    fn cache_with(store: Arc<CountingConfigStore>, ttl_secs: u64) -> PromptCache {
        PromptCache::new(store, Duration::from_secs(ttl_secs))
    }

    #[tokio::test]
    async fn test_second_lookup_within_ttl_is_served_from_cache() {
        let store = Arc::new(CountingConfigStore::with_engines(["T5"]));
        let cache = cache_with(Arc::clone(&store), 3600);

        let first = cache.get(&engine("T5")).await.unwrap();
        assert_eq!(store.fetch_count(), 1);

        let second = cache.get(&engine("T5")).await.unwrap();
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched_and_timestamp_updated() {
        let store = Arc::new(CountingConfigStore::with_engines(["T5"]));
        let cache = cache_with(Arc::clone(&store), 60);

        cache.get(&engine("T5")).await.unwrap();
        let first_fetch = cache.fetched_at(&engine("T5")).unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        cache.get(&engine("T5")).await.unwrap();
        assert_eq!(store.fetch_count(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get(&engine("T5")).await.unwrap();
        assert_eq!(store.fetch_count(), 2);
        assert!(cache.fetched_at(&engine("T5")).unwrap() > first_fetch);
    }

    #[tokio::test]
    async fn test_unknown_engine_is_an_error_and_not_cached() {
        let store = Arc::new(CountingConfigStore::with_engines(["T5"]));
        let cache = cache_with(Arc::clone(&store), 3600);

        let error = cache.get(&engine("missing")).await.unwrap_err();
        assert_eq!(error, ConfigStoreError::NotFound(engine("missing")));
        assert_eq!(cache.stats().entry_count, 0);

        cache.get(&engine("missing")).await.unwrap_err();
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refetch_does_not_poison_existing_state() {
        let store = Arc::new(CountingConfigStore::with_engines(["T5"]));
        let cache = cache_with(Arc::clone(&store), 10);

        cache.get(&engine("T5")).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        store.fail_next("store offline");
        let error = cache.get(&engine("T5")).await.unwrap_err();
        assert!(matches!(error, ConfigStoreError::Unavailable(_)));

        let config = cache.get(&engine("T5")).await.unwrap();
        assert_eq!(config.engine_id, engine("T5"));
        assert_eq!(store.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_clear_removes_only_the_named_entry() {
        let store = Arc::new(CountingConfigStore::with_engines(["T5", "T6"]));
        let cache = cache_with(Arc::clone(&store), 3600);

        cache.get(&engine("T5")).await.unwrap();
        cache.get(&engine("T6")).await.unwrap();

        assert!(cache.clear(&engine("T5")));
        assert!(!cache.clear(&engine("T5")));
        assert_eq!(cache.stats().engine_ids, vec![engine("T6")]);

        cache.get(&engine("T5")).await.unwrap();
        assert_eq!(store.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_clear_all_empties_the_cache() {
        let store = Arc::new(CountingConfigStore::with_engines(["T5", "T6"]));
        let cache = cache_with(Arc::clone(&store), 3600);

        cache.get(&engine("T5")).await.unwrap();
        cache.get(&engine("T6")).await.unwrap();

        assert_eq!(cache.clear_all(), 2);
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_report_size_ids_and_expiry() {
        let store = Arc::new(CountingConfigStore::with_engines(["T6", "T5"]));
        let cache = cache_with(Arc::clone(&store), 30);

        cache.get(&engine("T6")).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        cache.get(&engine("T5")).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.engine_ids, vec![engine("T5"), engine("T6")]);
        assert!(stats.total_size_bytes > 0);
        assert!(stats.oldest_fetch.is_some());
    }
}
