//! Tier chain whose cache reads always land in the durable statistics.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tally_backend::{DeleteStatus, FallbackStore, Store, StoreResult};
use tally_core::StoreLabel;
use tally_file::DurableStore;
use tracing::trace;

/// Wraps the facade's [`FallbackStore`].
///
/// The durable tier counts its own reads. A read answered by any other tier
/// (accelerator, memory) is recorded in the durable document afterwards, so
/// `cacheStats` covers every cache read whichever tier served it.
#[derive(Debug, Clone)]
pub(crate) struct AccountedStore {
    chain: FallbackStore,
    durable: DurableStore,
}

impl AccountedStore {
    pub(crate) fn new(chain: FallbackStore, durable: DurableStore) -> Self {
        Self { chain, durable }
    }

    pub(crate) fn chain(&self) -> &FallbackStore {
        &self.chain
    }
}

#[async_trait]
impl Store for AccountedStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        let served = self.chain.read_served(key).await?;
        if served.tier != self.durable.label() {
            trace!(tier = %served.tier, key, "recording read served ahead of durable tier");
            self.durable.record_read(served.value.is_some()).await;
        }
        Ok(served.value)
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        self.chain.peek(key).await
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        self.chain.write(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        self.chain.remove(key).await
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        self.chain.increment(name).await
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        self.chain.counter(name).await
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        self.chain.increment_with_expiry(key, ttl).await
    }

    fn label(&self) -> StoreLabel {
        self.chain.label()
    }
}
