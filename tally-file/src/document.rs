//! The persisted document and its in-place mutations.
//!
//! ```text
//! {
//!   "counters":   { "total_views": 12, ... },
//!   "cache":      { "<key>": { "value": ..., "expiresAtEpochMs": ..., "hitCount": ... } },
//!   "analytics":  { "pageViews": {...}, "dailyViews": {...}, "userActivity": {...} },
//!   "cacheStats": { "hits": ..., "misses": ..., "totalRequests": ..., "savedTimeMs": ... },
//!   "lastUpdated": "2024-05-01T12:00:00Z"
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::CacheEntry;

/// Counters every fresh document starts with.
pub const DEFAULT_COUNTERS: [&str; 3] = ["total_views", "unique_visitors", "total_messages"];

/// Users seen within this window count as active.
pub const ACTIVITY_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Illustrative time saved per cache hit, in milliseconds. Not a measurement.
pub const SAVED_MS_PER_HIT: u64 = 45;

/// The single persisted unit of the durable tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageDocument {
    /// Named monotonic counters.
    pub counters: BTreeMap<String, u64>,
    /// Cached values by key.
    pub cache: BTreeMap<String, CacheEntry>,
    /// Page and user aggregates.
    pub analytics: AnalyticsData,
    /// Hit/miss accounting for cache reads.
    pub cache_stats: CacheStats,
    /// Time of the last persisted write.
    pub last_updated: DateTime<Utc>,
}

/// Page-view and activity aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsData {
    /// Page id to visit count.
    pub page_views: BTreeMap<String, u64>,
    /// `"<YYYY-MM-DD>:views"` to visit count.
    pub daily_views: BTreeMap<String, u64>,
    /// User id to last-seen epoch milliseconds.
    pub user_activity: BTreeMap<String, i64>,
}

/// Cache read accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheStats {
    /// Reads that found a live entry.
    pub hits: u64,
    /// Reads that found nothing or an expired entry.
    pub misses: u64,
    /// Always `hits + misses`.
    pub total_requests: u64,
    /// Accrued [`SAVED_MS_PER_HIT`] estimates.
    pub saved_time_ms: u64,
}

impl CacheStats {
    /// Hit percentage rounded to the nearest integer, 0 without requests.
    pub fn hit_rate(&self) -> u64 {
        if self.total_requests == 0 {
            return 0;
        }
        (self.hits as f64 / self.total_requests as f64 * 100.0).round() as u64
    }

    fn record_hit(&mut self) {
        self.hits += 1;
        self.total_requests += 1;
        self.saved_time_ms += SAVED_MS_PER_HIT;
    }

    fn record_miss(&mut self) {
        self.misses += 1;
        self.total_requests += 1;
    }
}

impl Default for StorageDocument {
    fn default() -> Self {
        Self {
            counters: DEFAULT_COUNTERS
                .iter()
                .map(|name| (name.to_string(), 0))
                .collect(),
            cache: BTreeMap::new(),
            analytics: AnalyticsData::default(),
            cache_stats: CacheStats::default(),
            last_updated: DateTime::<Utc>::default(),
        }
    }
}

/// Key of the daily rollup for the UTC date of `now`.
pub(crate) fn daily_key(now: DateTime<Utc>) -> String {
    format!("{}:views", now.format("%Y-%m-%d"))
}

impl StorageDocument {
    pub(crate) fn increment_counter(&mut self, name: &str) -> u64 {
        let count = self.counters.entry(name.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub(crate) fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Stores `value` and drops every expired entry, including this one when
    /// `ttl` is zero.
    pub(crate) fn write_cache(&mut self, key: &str, value: Value, ttl: Duration, now: DateTime<Utc>) {
        self.cache
            .insert(key.to_owned(), CacheEntry::new(value, now, ttl));
        self.sweep_expired(now);
    }

    /// Counted read: updates [`CacheStats`] and the entry's hit count, and
    /// drops the entry if it has expired.
    pub(crate) fn read_cache(&mut self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        match self.cache.get(key).map(|entry| entry.is_live(now)) {
            Some(true) => {
                self.cache_stats.record_hit();
                self.cache.get_mut(key).map(|entry| {
                    entry.record_hit();
                    entry.value().clone()
                })
            }
            Some(false) => {
                self.cache.remove(key);
                self.cache_stats.record_miss();
                None
            }
            None => {
                self.cache_stats.record_miss();
                None
            }
        }
    }

    /// Counts a read answered by another tier.
    pub(crate) fn record_read(&mut self, hit: bool) {
        if hit {
            self.cache_stats.record_hit();
        } else {
            self.cache_stats.record_miss();
        }
    }

    /// Uncounted read.
    pub(crate) fn peek_cache(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        self.cache
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value().clone())
    }

    pub(crate) fn remove_cache(&mut self, key: &str) -> bool {
        self.cache.remove(key).is_some()
    }

    /// Bumps the counter stored as a cache value under `key`. A missing or
    /// expired entry restarts at 1 with expiry `now + ttl`.
    pub(crate) fn increment_expiring(&mut self, key: &str, ttl: Duration, now: DateTime<Utc>) -> u64 {
        let next = match self.cache.remove(key) {
            Some(entry) if entry.is_live(now) => {
                let count = entry.value().as_u64().unwrap_or(0).saturating_add(1);
                entry.with_value(Value::from(count))
            }
            _ => CacheEntry::new(Value::from(1u64), now, ttl),
        };
        let count = next.value().as_u64().unwrap_or(1);
        self.cache.insert(key.to_owned(), next);
        count
    }

    /// Removes entries under `prefix`, returning how many went.
    pub(crate) fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let before = self.cache.len();
        self.cache.retain(|key, _| !key.starts_with(prefix));
        before - self.cache.len()
    }

    /// Drops every entry that is no longer live.
    pub(crate) fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.is_live(now));
        before - self.cache.len()
    }

    pub(crate) fn live_entries(&self, now: DateTime<Utc>) -> usize {
        self.cache.values().filter(|entry| entry.is_live(now)).count()
    }

    pub(crate) fn track_page_view(&mut self, page: &str, now: DateTime<Utc>) {
        self.increment_counter("total_views");
        *self
            .analytics
            .page_views
            .entry(page.to_owned())
            .or_insert(0) += 1;
        *self
            .analytics
            .daily_views
            .entry(daily_key(now))
            .or_insert(0) += 1;
    }

    /// Records `user` as seen now and forgets users idle longer than
    /// [`ACTIVITY_WINDOW`].
    pub(crate) fn track_user_activity(&mut self, user: &str, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        self.analytics
            .user_activity
            .insert(user.to_owned(), now_ms);
        let cutoff = now_ms - ACTIVITY_WINDOW.as_millis() as i64;
        self.analytics
            .user_activity
            .retain(|_, seen| *seen >= cutoff);
    }

    pub(crate) fn active_users(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.timestamp_millis() - ACTIVITY_WINDOW.as_millis() as i64;
        self.analytics
            .user_activity
            .values()
            .filter(|seen| **seen > cutoff)
            .count()
    }
}
