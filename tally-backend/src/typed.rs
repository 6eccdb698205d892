use std::{future::Future, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{Store, StoreResult};

/// High-level store trait with typed operations.
///
/// This trait provides typed `get` and `set` that handle JSON
/// serialization, plus the read-through cache wrapper
/// [`get_or_compute`](TypedStore::get_or_compute). It is implemented for
/// every [`Store`].
pub trait TypedStore: Store {
    fn get<T>(&self, key: &str) -> impl Future<Output = StoreResult<Option<T>>> + Send
    where
        T: DeserializeOwned,
    {
        async move {
            match self.read(key).await? {
                Some(value) => Ok(Some(serde_json::from_value(value)?)),
                None => Ok(None),
            }
        }
    }

    fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> impl Future<Output = StoreResult<()>> + Send
    where
        T: Serialize + Sync,
    {
        async move {
            let value = serde_json::to_value(value)?;
            self.write(key, value, ttl).await
        }
    }

    /// Returns the cached value if live, otherwise runs `compute`, stores its
    /// result for `ttl` and returns it.
    ///
    /// Cache failures never fail the call: an unreadable or undecodable
    /// entry counts as a miss and a failed write is logged.
    fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> impl Future<Output = T> + Send
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send,
    {
        async move {
            if let Some(cached) = self.cached::<T>(key).await {
                return cached;
            }
            let fresh = compute().await;
            if let Err(error) = self.set(key, &fresh, ttl).await {
                warn!(key, %error, "failed to store computed value");
            }
            fresh
        }
    }

    /// Fallible variant of [`get_or_compute`](TypedStore::get_or_compute).
    /// Errors from `compute` are returned and nothing is stored.
    fn try_get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        async move {
            if let Some(cached) = self.cached::<T>(key).await {
                return Ok(cached);
            }
            let fresh = compute().await?;
            if let Err(error) = self.set(key, &fresh, ttl).await {
                warn!(key, %error, "failed to store computed value");
            }
            Ok(fresh)
        }
    }

    #[doc(hidden)]
    fn cached<T>(&self, key: &str) -> impl Future<Output = Option<T>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            match self.get::<T>(key).await {
                Ok(Some(value)) => {
                    debug!(key, "cache hit");
                    Some(value)
                }
                Ok(None) => {
                    debug!(key, "cache miss");
                    None
                }
                Err(error) => {
                    warn!(key, %error, "cache read failed, recomputing");
                    None
                }
            }
        }
    }
}

impl<S> TypedStore for S where S: Store + ?Sized {}
