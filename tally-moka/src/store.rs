//! Memory tier implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use serde_json::Value;
use tally_backend::{DeleteStatus, Store, StoreResult, metrics as store_metrics};
use tally_core::{CacheEntry, SharedClock, StoreLabel};
use tracing::trace;

use crate::builder::MemoryStoreBuilder;
use crate::metrics;

/// In-process memory tier powered by Moka.
///
/// `MemoryStore` holds cached values in a bounded Moka cache and named
/// counters in a [`DashMap`]. It never fails, so it is the natural last tier
/// of a [`FallbackStore`](tally_backend::FallbackStore).
///
/// Clones share the same data.
///
/// # Caveats
///
/// - Data is **not persisted**; it is lost on process restart
/// - Data is **not shared** across processes
/// - Liveness is checked against the store's clock on every read, so an
///   entry is never returned past its expiry even if Moka has not evicted it
///   yet
#[derive(Clone)]
pub struct MemoryStore {
    pub(crate) cache: Cache<String, CacheEntry>,
    pub(crate) counters: Arc<DashMap<String, u64>>,
    pub(crate) clock: SharedClock,
    pub(crate) label: StoreLabel,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("label", &self.label)
            .field("cache", &self.cache)
            .field("counters", &self.counters.len())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MemoryStore {
    /// Creates a new builder for `MemoryStore`.
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::new()
    }

    /// Number of cached values currently held.
    ///
    /// Pending evictions are applied first, so the figure is exact for the
    /// moment of the call.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        let entries = self.cache.entry_count();
        metrics::record_size(self.label.as_str(), entries, self.counters.len() as u64);
        entries
    }

    /// Drops every cached value and counter.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.counters.clear();
    }

    async fn live(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;
        if entry.is_live(self.clock.now()) {
            Some(entry)
        } else {
            trace!(tier = %self.label, key, "dropping expired entry");
            self.cache.invalidate(key).await;
            None
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        let value = self.live(key).await.map(CacheEntry::into_value);
        store_metrics::record_cache_read(self.label.as_str(), value.is_some());
        Ok(value)
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.live(key).await.map(CacheEntry::into_value))
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            self.cache.invalidate(key).await;
            return Ok(());
        }
        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        self.cache.insert(key.to_owned(), entry).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        let removed = self.cache.remove(key).await;
        match removed {
            Some(_) => Ok(DeleteStatus::Deleted(1)),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        let mut count = self.counters.entry(name.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        Ok(self.counters.get(name).map(|count| *count).unwrap_or(0))
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        let now = self.clock.now();
        let entry = self
            .cache
            .entry_by_ref(key)
            .and_upsert_with(|existing| {
                let next = match existing.map(|e| e.into_value()) {
                    Some(current) if current.is_live(now) => {
                        let count = current.value().as_u64().unwrap_or(0).saturating_add(1);
                        current.with_value(Value::from(count))
                    }
                    _ => CacheEntry::new(Value::from(1u64), now, ttl),
                };
                std::future::ready(next)
            })
            .await;
        Ok(entry.into_value().value().as_u64().unwrap_or(0))
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }
}
