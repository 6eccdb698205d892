use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tally_backend::{
    DeleteStatus, RateLimitDecision, RateLimiter, Store, StoreResult, metrics,
};
use tally_core::{SharedClock, StoreLabel, SystemClock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::io::{read_document, write_document};
use crate::{StatsSnapshot, StorageDocument};

/// File name used when the configured path is a directory.
pub const DEFAULT_FILE_NAME: &str = "tally-data.json";

/// How long the in-memory mirror is trusted before re-reading the file.
pub const DEFAULT_MIRROR_WINDOW: Duration = Duration::from_millis(1000);

/// File-backed document tier.
///
/// Holds counters, cache entries, analytics and cache statistics in one
/// JSON document. Every operation runs load, mutate and save under a single
/// async mutex, so operations on one store never lose each other's updates.
/// Writers in other processes are last-write-wins.
///
/// ```no_run
/// use tally_file::DurableStore;
///
/// # async fn run() {
/// let store = DurableStore::builder().path("/var/lib/myapp").build();
/// let views = store.increment_counter("total_views").await;
/// # }
/// ```
///
/// Cloning is cheap; clones share the same document and mirror.
#[derive(Clone)]
pub struct DurableStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: Option<PathBuf>,
    mirror_window: Duration,
    clock: SharedClock,
    label: StoreLabel,
    limiter: RateLimiter,
    mirror: Mutex<Mirror>,
}

#[derive(Default)]
struct Mirror {
    document: Option<StorageDocument>,
    refreshed_at: Option<DateTime<Utc>>,
    persist_failed: bool,
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("label", &self.inner.label)
            .field("path", &self.inner.path)
            .field("mirror_window", &self.inner.mirror_window)
            .finish()
    }
}

impl DurableStore {
    /// Starts building a new store.
    pub fn builder() -> DurableStoreBuilder {
        DurableStoreBuilder::default()
    }

    /// Store that never touches disk.
    ///
    /// Data is lost when dropped. Equivalent to `builder().build()`.
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Location of the document file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Current document.
    ///
    /// Served from the mirror while it is fresh; otherwise read from disk,
    /// falling back to (and persisting) defaults when the file is absent or
    /// malformed.
    pub async fn load(&self) -> StorageDocument {
        self.inspect(|document, _| document.clone()).await
    }

    /// Replaces the whole document.
    ///
    /// Stamps `lastUpdated`. A failed write is logged and the document is
    /// kept in memory.
    pub async fn save(&self, document: StorageDocument) {
        let mut mirror = self.inner.mirror.lock().await;
        let now = self.inner.clock.now();
        self.persist(&mut mirror, document, now).await;
    }

    /// Forgets the mirror so the next call reads the file.
    pub async fn invalidate_mirror(&self) {
        *self.inner.mirror.lock().await = Mirror::default();
    }

    /// Adds one to the named counter and returns the new count.
    pub async fn increment_counter(&self, name: &str) -> u64 {
        self.update(|document, _| document.increment_counter(name))
            .await
    }

    /// Current count, 0 if the counter was never touched.
    pub async fn get_counter(&self, name: &str) -> u64 {
        self.inspect(|document, _| document.counter(name)).await
    }

    /// Caches `value` for `ttl`, sweeping every expired entry.
    pub async fn set_cache(&self, key: &str, value: Value, ttl: Duration) {
        self.update(|document, now| document.write_cache(key, value, ttl, now))
            .await
    }

    /// Reads a cached value, recording a hit or a miss.
    pub async fn get_cache(&self, key: &str) -> Option<Value> {
        let value = self
            .update(|document, now| document.read_cache(key, now))
            .await;
        debug!(tier = %self.inner.label, key, hit = value.is_some(), "cache read");
        metrics::record_cache_read(self.inner.label.as_str(), value.is_some());
        value
    }

    /// Adds a hit or a miss to the cache statistics without reading.
    ///
    /// For reads answered by a tier in front of this one, so that the
    /// document keeps counting every cache read.
    pub async fn record_read(&self, hit: bool) {
        self.update(|document, _| document.record_read(hit)).await
    }

    /// Reads a cached value without touching statistics.
    pub async fn peek_cache(&self, key: &str) -> Option<Value> {
        self.inspect(|document, now| document.peek_cache(key, now))
            .await
    }

    /// Deletes a cached value.
    pub async fn remove_cache(&self, key: &str) -> DeleteStatus {
        let removed = self
            .update(|document, _| document.remove_cache(key))
            .await;
        if removed {
            DeleteStatus::Deleted(1)
        } else {
            DeleteStatus::Missing
        }
    }

    /// Bumps an expiring counter stored as a cache value.
    pub async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> u64 {
        self.update(|document, now| document.increment_expiring(key, ttl, now))
            .await
    }

    /// Removes every cache entry whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let removed = self
            .update(|document, _| document.invalidate_prefix(prefix))
            .await;
        debug!(tier = %self.inner.label, prefix, removed, "invalidated prefix");
        removed
    }

    /// Counts a view of `page` in the totals, the page breakdown and today's
    /// rollup.
    pub async fn track_page_view(&self, page: &str) {
        self.update(|document, now| document.track_page_view(page, now))
            .await
    }

    /// Marks `user` as active now.
    pub async fn track_user_activity(&self, user: &str) {
        self.update(|document, now| document.track_user_activity(user, now))
            .await
    }

    /// Site statistics.
    pub async fn stats(&self) -> StatsSnapshot {
        self.inspect(StatsSnapshot::from_document).await
    }

    /// Sliding-log rate limit check against this document.
    ///
    /// Never fails: if the check cannot run the request is let through.
    pub async fn check_rate_limit(
        &self,
        id: &str,
        limit: u64,
        window: Duration,
    ) -> RateLimitDecision {
        match self.inner.limiter.check(self, id, limit, window).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(id, %error, "rate limit check failed, allowing request");
                RateLimitDecision::fail_open(limit)
            }
        }
    }

    /// Replaces everything with a fresh default document.
    pub async fn clear_all_data(&self) {
        info!(tier = %self.inner.label, "clearing all data");
        self.save(StorageDocument::default()).await
    }

    async fn inspect<R>(&self, f: impl FnOnce(&StorageDocument, DateTime<Utc>) -> R) -> R {
        let mut mirror = self.inner.mirror.lock().await;
        let now = self.inner.clock.now();
        let (document, fresh) = self.checkout(&mut mirror, now).await;
        let result = f(&document, now);
        if fresh {
            self.persist(&mut mirror, document, now).await;
        } else {
            mirror.document = Some(document);
        }
        result
    }

    async fn update<R>(&self, f: impl FnOnce(&mut StorageDocument, DateTime<Utc>) -> R) -> R {
        let mut mirror = self.inner.mirror.lock().await;
        let now = self.inner.clock.now();
        let (mut document, _) = self.checkout(&mut mirror, now).await;
        let result = f(&mut document, now);
        self.persist(&mut mirror, document, now).await;
        result
    }

    /// Takes the current document out of the mirror, re-reading the file if
    /// the mirror is stale. The flag is set when the document is a fresh
    /// default that still has to be written.
    async fn checkout(&self, mirror: &mut Mirror, now: DateTime<Utc>) -> (StorageDocument, bool) {
        if let Some(document) = mirror.document.take()
            && self.is_fresh(mirror, now)
        {
            return (document, false);
        }

        let Some(path) = self.inner.path.as_deref() else {
            return (StorageDocument::default(), true);
        };

        match read_document(path).await {
            Ok(document) => {
                mirror.refreshed_at = Some(now);
                (document, false)
            }
            Err(error) if error.is_missing() => {
                debug!(path = %path.display(), "no document yet, starting from defaults");
                (StorageDocument::default(), true)
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "unreadable document, starting from defaults");
                (StorageDocument::default(), true)
            }
        }
    }

    fn is_fresh(&self, mirror: &Mirror, now: DateTime<Utc>) -> bool {
        if self.inner.path.is_none() || mirror.persist_failed {
            return true;
        }
        let window_ms = i64::try_from(self.inner.mirror_window.as_millis()).unwrap_or(i64::MAX);
        mirror
            .refreshed_at
            .is_some_and(|at| (now - at).num_milliseconds() < window_ms)
    }

    async fn persist(&self, mirror: &mut Mirror, mut document: StorageDocument, now: DateTime<Utc>) {
        document.last_updated = now;

        if let Some(path) = self.inner.path.as_deref() {
            match write_document(path, &document).await {
                Ok(()) => {
                    if mirror.persist_failed {
                        info!(path = %path.display(), "document writable again");
                    }
                    mirror.persist_failed = false;
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to persist document, keeping it in memory");
                    metrics::record_persist_error(self.inner.label.as_str());
                    mirror.persist_failed = true;
                }
            }
        }

        mirror.document = Some(document);
        mirror.refreshed_at = Some(now);
    }
}

/// Builder for [`DurableStore`].
///
/// ```no_run
/// use std::time::Duration;
/// use tally_file::DurableStore;
///
/// let store = DurableStore::builder()
///     .path("/var/lib/myapp/site.json")
///     .mirror_window(Duration::from_millis(250))
///     .label("site")
///     .build();
/// ```
pub struct DurableStoreBuilder {
    path: Option<PathBuf>,
    mirror_window: Duration,
    clock: SharedClock,
    label: StoreLabel,
}

impl Default for DurableStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            mirror_window: DEFAULT_MIRROR_WINDOW,
            clock: SystemClock::shared(),
            label: StoreLabel::new_static("durable"),
        }
    }
}

impl DurableStoreBuilder {
    /// Enables persistence at the given path.
    ///
    /// Without this, the document lives only in memory. If path is an
    /// existing directory, [`DEFAULT_FILE_NAME`] is used inside it.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// How long the mirror is served without re-reading the file.
    ///
    /// Default: 1 second
    pub fn mirror_window(mut self, window: Duration) -> Self {
        self.mirror_window = window;
        self
    }

    /// Time source for expiry, rollups and the mirror window.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Identifies this store in multi-tier setups and metrics.
    pub fn label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Creates the store. Nothing is read or written until first use.
    pub fn build(self) -> DurableStore {
        let path = self.path.map(|mut path| {
            if path.is_dir() {
                path.push(DEFAULT_FILE_NAME);
            }
            path
        });

        DurableStore {
            inner: Arc::new(Inner {
                path,
                mirror_window: self.mirror_window,
                limiter: RateLimiter::sliding_log(self.clock.clone()),
                clock: self.clock,
                label: self.label,
                mirror: Mutex::new(Mirror::default()),
            }),
        }
    }
}

#[async_trait]
impl Store for DurableStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.get_cache(key).await)
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.peek_cache(key).await)
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        self.set_cache(key, value, ttl).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        Ok(self.remove_cache(key).await)
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        Ok(self.increment_counter(name).await)
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        Ok(self.get_counter(name).await)
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        Ok(DurableStore::increment_with_expiry(self, key, ttl).await)
    }

    fn label(&self) -> StoreLabel {
        self.inner.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tally_core::{Clock, ManualClock};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, clock: &ManualClock) -> DurableStore {
        DurableStore::builder()
            .path(dir.path())
            .clock(Arc::new(clock.clone()))
            .build()
    }

    #[tokio::test]
    async fn test_directory_path_gets_default_file_name() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::builder().path(dir.path()).build();
        assert_eq!(store.path(), Some(dir.path().join(DEFAULT_FILE_NAME).as_path()));
    }

    #[tokio::test]
    async fn test_first_access_persists_defaults() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::starting_now();
        let store = store_in(&dir, &clock);

        assert_eq!(store.get_counter("total_views").await, 0);

        let on_disk = read_document(store.path().unwrap()).await.unwrap();
        assert_eq!(on_disk.counters, StorageDocument::default().counters);
        assert_eq!(on_disk.last_updated, clock.now());
    }

    #[tokio::test]
    async fn test_mirror_serves_within_window() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::starting_now();
        let store = store_in(&dir, &clock);
        store.increment_counter("hits").await;

        // another writer changes the file behind the mirror
        let mut external = read_document(store.path().unwrap()).await.unwrap();
        external.counters.insert("hits".to_owned(), 40);
        write_document(store.path().unwrap(), &external).await.unwrap();

        clock.advance(Duration::from_millis(999));
        assert_eq!(store.get_counter("hits").await, 1);

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get_counter("hits").await, 40);
    }

    #[tokio::test]
    async fn test_unwritable_path_keeps_working_in_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"").await.unwrap();
        let clock = ManualClock::starting_now();
        let store = DurableStore::builder()
            .path(blocker.join("data.json"))
            .clock(Arc::new(clock.clone()))
            .build();

        store.increment_counter("total_views").await;
        clock.advance(Duration::from_secs(5));
        store.increment_counter("total_views").await;

        assert_eq!(store.get_counter("total_views").await, 2);
    }

    #[tokio::test]
    async fn test_in_memory_store_has_no_path() {
        let store = DurableStore::in_memory();
        assert!(store.path().is_none());
        store.set_cache("k", json!(true), Duration::from_secs(1)).await;
        assert_eq!(store.get_cache("k").await, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_recorded_reads_count_without_entries() {
        let store = DurableStore::in_memory();
        store.record_read(true).await;
        store.record_read(false).await;

        let cache = store.stats().await.cache;
        assert_eq!((cache.hits, cache.misses, cache.total_requests), (1, 1, 2));
        assert_eq!(cache.hit_rate, 50);
        assert_eq!(cache.entries, 0);
    }
}
