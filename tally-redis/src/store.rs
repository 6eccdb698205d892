//! Redis accelerator tier implementation.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use redis::{
    Client, FromRedisValue,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;
use tally_backend::{DeleteStatus, Store, StoreError, StoreResult, metrics};
use tally_core::{Namespace, StoreLabel};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::{Error, RetryPolicy};

/// Redis accelerator built on the redis-rs crate.
///
/// Uses a [`ConnectionManager`] created lazily on first use and reused until
/// [`close`](AcceleratorStore::close). See the [crate docs](crate) for the
/// command mapping and the availability rules.
///
/// Cloning is cheap; clones share the connection.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct AcceleratorStore {
    inner: Arc<Inner>,
}

struct Inner {
    client: Option<Client>,
    retry: RetryPolicy,
    label: StoreLabel,
    state: Mutex<Connection>,
}

#[derive(Default)]
struct Connection {
    manager: Option<ConnectionManager>,
    gave_up_at: Option<Instant>,
    /// A caller is running the connect loop; others answer `Unavailable`.
    connecting: bool,
}

impl Inner {
    // never held across an await
    fn state(&self) -> MutexGuard<'_, Connection> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears [`Connection::connecting`] when the connect loop ends, including
/// when the caller's future is dropped mid-backoff.
struct Connecting<'a>(&'a Inner);

impl Drop for Connecting<'_> {
    fn drop(&mut self) {
        self.0.state().connecting = false;
    }
}

impl std::fmt::Debug for AcceleratorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceleratorStore")
            .field("label", &self.inner.label)
            .field("configured", &self.is_configured())
            .field("retry", &self.inner.retry)
            .finish()
    }
}

impl AcceleratorStore {
    /// Creates a new builder. Without a URL the built store is inert.
    #[must_use]
    pub fn builder() -> AcceleratorStoreBuilder {
        AcceleratorStoreBuilder::default()
    }

    /// An accelerator with no server configured.
    pub fn disabled() -> Self {
        Self::from_parts(None, RetryPolicy::default(), StoreLabel::new_static("accelerator"))
    }

    fn from_parts(client: Option<Client>, retry: RetryPolicy, label: StoreLabel) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                retry,
                label,
                state: Mutex::new(Connection::default()),
            }),
        }
    }

    /// Whether a server URL was configured.
    pub fn is_configured(&self) -> bool {
        self.inner.client.is_some()
    }

    /// Whether the next call would try the network: a server is configured,
    /// no connection attempt is in flight and the store is not cooling down
    /// after giving up.
    pub async fn is_available(&self) -> bool {
        if !self.is_configured() {
            return false;
        }
        let state = self.inner.state();
        if state.manager.is_some() {
            return true;
        }
        !state.connecting
            && state
                .gave_up_at
                .is_none_or(|at| at.elapsed() >= self.inner.retry.cooldown)
    }

    /// Round-trip time of a `PING`.
    pub async fn ping(&self) -> StoreResult<Duration> {
        let started = Instant::now();
        let _: String = self.query(&redis::cmd("PING")).await?;
        Ok(started.elapsed())
    }

    /// Drops the connection. The next call connects again.
    pub async fn close(&self) {
        let manager = self.inner.state().manager.take();
        if manager.is_some() {
            info!(tier = %self.inner.label, "accelerator connection closed");
        }
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable(self.inner.label.clone())
    }

    /// Lazy connection with capped exponential backoff.
    ///
    /// Only one caller runs the connect loop, without holding the state
    /// lock; concurrent callers get `Unavailable` and fall through to the
    /// next tier.
    async fn connection(&self) -> StoreResult<ConnectionManager> {
        let Some(client) = self.inner.client.as_ref() else {
            return Err(self.unavailable());
        };

        {
            let mut state = self.inner.state();
            if let Some(manager) = state.manager.as_ref() {
                return Ok(manager.clone());
            }
            if let Some(at) = state.gave_up_at
                && at.elapsed() < self.inner.retry.cooldown
            {
                trace!(tier = %self.inner.label, "accelerator cooling down");
                return Err(self.unavailable());
            }
            if state.connecting {
                trace!(tier = %self.inner.label, "accelerator connecting elsewhere");
                return Err(self.unavailable());
            }
            state.connecting = true;
        }
        let _connecting = Connecting(&self.inner);

        let retry = self.inner.retry;
        let mut retries = 0;
        loop {
            // retries are driven here, not by the manager
            let config = ConnectionManagerConfig::new().set_number_of_retries(0);
            match client.get_connection_manager_with_config(config).await {
                Ok(manager) => {
                    info!(tier = %self.inner.label, retries, "accelerator connected");
                    let mut state = self.inner.state();
                    state.manager = Some(manager.clone());
                    state.gave_up_at = None;
                    return Ok(manager);
                }
                Err(error) if retries < retry.max_retries => {
                    retries += 1;
                    let delay = retry.delay(retries);
                    debug!(tier = %self.inner.label, %error, retries, ?delay, "accelerator connection failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(
                        tier = %self.inner.label,
                        %error,
                        retries,
                        cooldown = ?retry.cooldown,
                        "accelerator unreachable, marking unavailable"
                    );
                    self.inner.state().gave_up_at = Some(Instant::now());
                    return Err(self.unavailable());
                }
            }
        }
    }

    async fn query<T>(&self, cmd: &redis::Cmd) -> StoreResult<T>
    where
        T: FromRedisValue,
    {
        let mut con = self.connection().await?;
        cmd.query_async(&mut con)
            .await
            .map_err(|e| StoreError::from(Error::from(e)))
    }
}

/// Whole seconds for `EX`/`EXPIRE`, rounded up so sub-second TTLs still
/// expire.
fn expire_secs(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}

/// Part of builder pattern implementation for AcceleratorStore.
pub struct AcceleratorStoreBuilder {
    url: Option<String>,
    retry: RetryPolicy,
    label: StoreLabel,
}

impl Default for AcceleratorStoreBuilder {
    fn default() -> Self {
        Self {
            url: None,
            retry: RetryPolicy::default(),
            label: StoreLabel::new_static("accelerator"),
        }
    }
}

impl AcceleratorStoreBuilder {
    /// Set connection URL (host, port, database, etc.).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the connection retry schedule.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set a custom label for this tier.
    pub fn label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Create the store. Fails only on a malformed URL; nothing connects
    /// until first use.
    pub fn build(self) -> Result<AcceleratorStore, Error> {
        let client = self.url.map(Client::open).transpose()?;
        Ok(AcceleratorStore::from_parts(client, self.retry, self.label))
    }
}

#[async_trait]
impl Store for AcceleratorStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        let value = self.peek(key).await?;
        metrics::record_cache_read(self.inner.label.as_str(), value.is_some());
        Ok(value)
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        let raw: Option<String> = self.query(redis::cmd("GET").arg(key)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            self.remove(key).await?;
            return Ok(());
        }
        let encoded = serde_json::to_string(&value)?;
        self.query::<()>(
            redis::cmd("SET")
                .arg(key)
                .arg(encoded)
                .arg("EX")
                .arg(expire_secs(ttl)),
        )
        .await
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        let deleted: u32 = self.query(redis::cmd("DEL").arg(key)).await?;
        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        self.query(redis::cmd("INCR").arg(Namespace::Counter.key(name)))
            .await
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        let count: Option<u64> = self
            .query(redis::cmd("GET").arg(Namespace::Counter.key(name)))
            .await?;
        Ok(count.unwrap_or(0))
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        let count: u64 = self.query(redis::cmd("INCR").arg(key)).await?;
        if count == 1 {
            self.query::<()>(redis::cmd("EXPIRE").arg(key).arg(expire_secs(ttl)))
                .await?;
        }
        Ok(count)
    }

    fn label(&self) -> StoreLabel {
        self.inner.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expire_secs_rounds_up() {
        assert_eq!(expire_secs(Duration::from_secs(60)), 60);
        assert_eq!(expire_secs(Duration::from_millis(1500)), 2);
        assert_eq!(expire_secs(Duration::from_millis(1)), 1);
    }

    #[test]
    fn test_invalid_url_fails_build() {
        let result = AcceleratorStore::builder().url("not-a-valid-url").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_disabled_is_not_configured() {
        assert!(!AcceleratorStore::disabled().is_configured());
    }
}
