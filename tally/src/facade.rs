use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tally_backend::{
    DeleteStatus, FallbackStore, RateLimitDecision, RateLimiter, Store, StoreResult, TypedStore,
};
use tally_core::{Namespace, SharedClock, SystemClock};
use tally_file::{DurableStore, StatsSnapshot, StorageDocument};
use tally_moka::MemoryStore;
use tally_redis::AcceleratorStore;
use tracing::{debug, info, warn};

use crate::accounted::AccountedStore;
use crate::analytics::Analytics;
use crate::health::{AcceleratorHealth, Health};
use crate::{ConfigError, TallyConfig, metrics};

/// TTL used by callers that do not pick one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Tiered cache, counter, rate-limit and analytics store.
///
/// Cache, session and rate-limit calls go through a [`FallbackStore`] of
/// accelerator (if configured), durable document (if enabled) and memory
/// tier, in that order. Counters and analytics always use the durable
/// document, which also accounts every cache read whichever tier served it.
/// None of the data operations fail: when every tier errors the call logs
/// and returns a default.
///
/// Cloning is cheap; clones share the same tiers.
#[derive(Debug, Clone)]
pub struct Tally {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: TallyConfig,
    accelerator: AcceleratorStore,
    durable: DurableStore,
    memory: MemoryStore,
    store: AccountedStore,
    limiter: RateLimiter,
    analytics: Analytics,
}

/// Part of builder pattern implementation for Tally.
pub struct TallyBuilder {
    config: TallyConfig,
    clock: Option<SharedClock>,
}

impl TallyBuilder {
    /// Time source for expiry, mirror freshness and rate-limit windows.
    /// The accelerator keeps using server time.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the tiers and loads the durable document, creating the file
    /// with defaults when absent. Nothing connects to Redis until first use.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn open(self) -> Result<Tally, ConfigError> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(SystemClock::shared);

        let mut accelerator = AcceleratorStore::builder().retry(config.accelerator.retry_policy());
        if let Some(url) = &config.accelerator.url {
            accelerator = accelerator.url(url.clone());
        }
        let accelerator = accelerator.build()?;

        let mut durable = DurableStore::builder()
            .mirror_window(config.storage.mirror_window)
            .clock(clock.clone());
        if config.storage.enabled {
            durable = durable.path(config.storage.file_path());
        }
        let durable = durable.build();

        let memory = MemoryStore::builder()
            .max_entries(config.memory.max_entries)
            .clock(clock.clone())
            .build();

        let mut chain = FallbackStore::new().name("tally");
        if accelerator.is_configured() {
            chain = chain.tier(accelerator.clone());
        }
        if config.storage.enabled {
            chain = chain.tier(durable.clone());
        }
        let chain = chain.tier(memory.clone());

        durable.load().await;
        info!(tiers = ?chain.labels(), path = ?durable.path(), "tally opened");

        let limiter = RateLimiter::new(config.rate_limit.strategy, clock.clone());
        let store = AccountedStore::new(chain, durable.clone());
        let analytics = Analytics::new(durable.clone(), store.clone(), clock);
        Ok(Tally {
            inner: Arc::new(Inner {
                config,
                accelerator,
                durable,
                memory,
                store,
                limiter,
                analytics,
            }),
        })
    }
}

impl Tally {
    /// Starts building a store from `config`.
    pub fn builder(config: TallyConfig) -> TallyBuilder {
        TallyBuilder {
            config,
            clock: None,
        }
    }

    /// Opens a store with the system clock.
    pub async fn open(config: TallyConfig) -> Result<Self, ConfigError> {
        Self::builder(config).open().await
    }

    /// Opens a store configured from `REDIS_URL` and `DATA_DIR`.
    pub async fn from_env() -> Result<Self, ConfigError> {
        Self::open(TallyConfig::from_env()).await
    }

    /// Configuration the store was opened with.
    pub fn config(&self) -> &TallyConfig {
        &self.inner.config
    }

    /// The tier chain, for callers that want to know which tier served a
    /// call (see [`FallbackStore::read_served`]).
    pub fn tiers(&self) -> &FallbackStore {
        self.inner.store.chain()
    }

    /// Analytics over the durable document.
    pub fn analytics(&self) -> &Analytics {
        &self.inner.analytics
    }

    /// Cached value under `key`; a stored `null` is `Some(Value::Null)`.
    pub async fn get_cache(&self, key: &str) -> Option<Value> {
        degrade("get_cache", key, self.inner.store.read(key).await)
    }

    /// Stores `value` under `key` for `ttl`. A zero TTL removes the key.
    pub async fn set_cache(&self, key: &str, value: Value, ttl: Duration) {
        degrade("set_cache", key, self.inner.store.write(key, value, ttl).await)
    }

    /// Removes `key`; returns whether it was present.
    pub async fn remove_cache(&self, key: &str) -> bool {
        let status = self.inner.store.remove(key).await.map(Some);
        matches!(
            degrade("remove_cache", key, status),
            Some(DeleteStatus::Deleted(_))
        )
    }

    /// Returns the cached value under `key`, computing and storing it for
    /// `ttl` on a miss.
    pub async fn cached<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> T
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send,
    {
        self.inner.store.get_or_compute(key, ttl, compute).await
    }

    /// Fallible [`cached`](Self::cached): errors are returned and not
    /// stored.
    pub async fn try_cached<T, E, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.inner.store.try_get_or_compute(key, ttl, compute).await
    }

    /// Durable cache entries whose key starts with `prefix` are removed.
    /// Returns how many were removed.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.inner.durable.invalidate_prefix(prefix).await
    }

    /// Adds one to the named counter and returns the new count.
    ///
    /// Counters belong to the durable document, the same place
    /// [`track_page_view`](Self::track_page_view) counts `total_views`.
    pub async fn increment_counter(&self, name: &str) -> u64 {
        self.inner.durable.increment_counter(name).await
    }

    /// Current count, `0` for unknown counters.
    pub async fn get_counter(&self, name: &str) -> u64 {
        self.inner.durable.get_counter(name).await
    }

    /// Counts one visit of `page`, in `total_views` and the page rollups.
    pub async fn track_page_view(&self, page: &str) {
        self.inner.analytics.track_page_view(page).await;
    }

    /// Marks `user` as active now.
    pub async fn track_user_activity(&self, user: &str) {
        self.inner.analytics.track_user_activity(user).await;
    }

    /// Site statistics; see [`StatsSnapshot`].
    pub async fn stats(&self) -> StatsSnapshot {
        self.inner.analytics.stats().await
    }

    /// Checks and records one attempt for `id`.
    ///
    /// Fails open: if no tier can be consulted the request is allowed with
    /// the full budget.
    pub async fn check_rate_limit(&self, id: &str, limit: u64, window: Duration) -> RateLimitDecision {
        match self
            .inner
            .limiter
            .check(&self.inner.store, id, limit, window)
            .await
        {
            Ok(decision) => decision,
            Err(error) => {
                warn!(id, %error, "rate limit check failed, allowing request");
                metrics::record_degraded("check_rate_limit");
                RateLimitDecision::fail_open(limit)
            }
        }
    }

    /// [`check_rate_limit`](Self::check_rate_limit) with the configured
    /// limit and window.
    pub async fn check_default_rate_limit(&self, id: &str) -> RateLimitDecision {
        let config = &self.inner.config.rate_limit;
        self.check_rate_limit(id, config.limit, config.window).await
    }

    /// Stores session `data` for the configured session TTL.
    pub async fn set_session<T>(&self, id: &str, data: &T)
    where
        T: Serialize + Sync,
    {
        self.set_session_with_ttl(id, data, self.inner.config.sessions.ttl)
            .await
    }

    /// Stores session `data` for `ttl`.
    pub async fn set_session_with_ttl<T>(&self, id: &str, data: &T, ttl: Duration)
    where
        T: Serialize + Sync,
    {
        let key = Namespace::Session.key(id);
        degrade("set_session", &key, self.inner.store.set(&key, data, ttl).await)
    }

    /// Session data, `None` when absent, expired or of another shape.
    pub async fn get_session<T>(&self, id: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let key = Namespace::Session.key(id);
        degrade("get_session", &key, self.inner.store.get(&key).await)
    }

    /// Ends a session; returns whether it existed.
    pub async fn delete_session(&self, id: &str) -> bool {
        self.remove_cache(&Namespace::Session.key(id)).await
    }

    /// Resets the durable document to defaults and empties the memory tier.
    /// The accelerator is left untouched.
    pub async fn clear_all_data(&self) {
        self.inner.durable.clear_all_data().await;
        self.inner.memory.clear();
        info!("all data cleared");
    }

    /// Full durable document, for export and debugging.
    pub async fn snapshot(&self) -> StorageDocument {
        self.inner.durable.load().await
    }

    /// Probes every tier.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn health(&self) -> Health {
        let accelerator = &self.inner.accelerator;
        let mut report = AcceleratorHealth {
            configured: accelerator.is_configured(),
            ..AcceleratorHealth::default()
        };
        if accelerator.is_available().await {
            match accelerator.ping().await {
                Ok(latency) => {
                    report.available = true;
                    report.latency = Some(latency);
                }
                Err(error) => debug!(%error, "accelerator ping failed"),
            }
        }

        Health {
            tiers: self.inner.store.chain().labels(),
            accelerator: report,
            memory_entries: self.inner.memory.entry_count().await,
            durable_path: self.inner.durable.path().map(ToOwned::to_owned),
        }
    }

    /// Drops the accelerator connection. Other tiers need no teardown; the
    /// store stays usable and reconnects on demand.
    pub async fn close(&self) {
        self.inner.accelerator.close().await;
    }
}

/// Unwraps a chain result, logging and substituting the default when every
/// tier failed.
fn degrade<T: Default>(op: &'static str, key: &str, result: StoreResult<T>) -> T {
    result.unwrap_or_else(|error| {
        warn!(op, key, %error, "all tiers failed, using default");
        metrics::record_degraded(op);
        T::default()
    })
}
