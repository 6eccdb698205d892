//! Builder for configuring [`MemoryStore`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use moka::Expiry;
use moka::future::{Cache, CacheBuilder};
use moka::policy::EvictionPolicy;
use tally_core::{CacheEntry, SharedClock, StoreLabel, SystemClock};

use crate::store::MemoryStore;

/// Default maximum number of cached values.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Expiration policy that derives each entry's TTL from its absolute
/// `expires_at_epoch_ms`.
#[derive(Clone, Debug)]
pub(crate) struct Expiration {
    clock: SharedClock,
}

impl Expiry<String, CacheEntry> for Expiration {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.calculate_ttl(value))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Always follow the new value. Moka's default keeps the old deadline,
        // which would cut short an overwrite with a longer TTL.
        Some(self.calculate_ttl(value))
    }
}

impl Expiration {
    fn calculate_ttl(&self, value: &CacheEntry) -> Duration {
        value.ttl(self.clock.now()).unwrap_or(Duration::ZERO)
    }
}

/// Builder for creating and configuring a [`MemoryStore`].
///
/// Use [`MemoryStore::builder`] to create a new builder instance.
///
/// # Examples
///
/// ```
/// use tally_moka::MemoryStore;
///
/// let memory = MemoryStore::builder()
///     .max_entries(1_000)
///     .label("fallback")
///     .build();
/// ```
pub struct MemoryStoreBuilder {
    max_entries: u64,
    label: StoreLabel,
    clock: SharedClock,
    eviction_policy: Option<EvictionPolicy>,
}

impl MemoryStoreBuilder {
    /// Creates a builder with [`DEFAULT_MAX_ENTRIES`] capacity.
    pub fn new() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            label: StoreLabel::new_static("memory"),
            clock: SystemClock::shared(),
            eviction_policy: None,
        }
    }

    /// Sets the maximum number of cached values.
    ///
    /// When the cache exceeds this capacity, entries are evicted according to
    /// the eviction policy. Counters are not bounded.
    pub fn max_entries(mut self, capacity: u64) -> Self {
        self.max_entries = capacity;
        self
    }

    /// Sets a custom label for this store.
    ///
    /// # Default
    ///
    /// `"memory"`
    pub fn label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the time source used for expiry.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the eviction policy for the cache.
    ///
    /// # Default
    ///
    /// [`EvictionPolicy::tiny_lfu()`]
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Builds the [`MemoryStore`].
    pub fn build(self) -> MemoryStore {
        let policy = self
            .eviction_policy
            .unwrap_or_else(EvictionPolicy::tiny_lfu);
        let cache: Cache<String, CacheEntry> = CacheBuilder::new(self.max_entries)
            .name(self.label.as_str())
            .eviction_policy(policy)
            .expire_after(Expiration {
                clock: self.clock.clone(),
            })
            .build();

        MemoryStore {
            cache,
            counters: Arc::new(DashMap::new()),
            clock: self.clock,
            label: self.label,
        }
    }
}

impl Default for MemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
