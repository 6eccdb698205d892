use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tally_core::StoreLabel;

use crate::{DeleteStatus, StoreError};

pub type StoreResult<T> = Result<T, StoreError>;

/// One storage tier.
///
/// Implemented by the accelerator (Redis), the durable file store and the
/// in-process memory store, and by [`FallbackStore`](crate::FallbackStore)
/// which chains them.
///
/// Counters live in their own namespace: `increment("views")` and
/// `get("views")` never see each other.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads a live value. `Ok(None)` is a miss; a stored JSON `null` comes
    /// back as `Ok(Some(Value::Null))`.
    ///
    /// Tiers that keep hit/miss statistics count this read.
    async fn read(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Reads a live value without touching hit/miss statistics.
    ///
    /// Used for bookkeeping records such as rate-limit logs.
    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        self.read(key).await
    }

    /// Writes `value` so that it expires `ttl` from now. A zero TTL leaves
    /// nothing readable.
    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus>;

    /// Adds one to the named counter and returns the new count.
    async fn increment(&self, name: &str) -> StoreResult<u64>;

    /// Current count, 0 if the counter was never touched.
    async fn counter(&self, name: &str) -> StoreResult<u64>;

    /// Adds one to an expiring counter stored under `key`.
    ///
    /// The first touch creates the counter with expiry `now + ttl`; later
    /// increments keep that expiry.
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64>;

    /// Returns the label of this tier for "served by" reporting and metrics.
    fn label(&self) -> StoreLabel {
        StoreLabel::new_static("store")
    }
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).read(key).await
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).peek(key).await
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        (**self).increment(name).await
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        (**self).counter(name).await
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        (**self).increment_with_expiry(key, ttl).await
    }

    fn label(&self) -> StoreLabel {
        (**self).label()
    }
}

#[async_trait]
impl<S> Store for Box<S>
where
    S: Store + ?Sized,
{
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).read(key).await
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).peek(key).await
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        (**self).increment(name).await
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        (**self).counter(name).await
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        (**self).increment_with_expiry(key, ttl).await
    }

    fn label(&self) -> StoreLabel {
        (**self).label()
    }
}
