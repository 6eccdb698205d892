//! Cached value type with expiration metadata.
//!
//! A [`CacheEntry`] wraps an arbitrary JSON payload with an absolute expiry
//! (epoch milliseconds) and a hit counter. The same shape is persisted by the
//! durable tier and held in memory by the in-process tier.
//!
//! ## Lifecycle
//!
//! ```text
//! absent --set--> live --read--> live (hit_count + 1)
//!                  |
//!                time passes
//!                  v
//!               expired --read or sweep--> absent
//! ```
//!
//! An expired entry never becomes live again; a new `set` always creates a
//! fresh entry with `hit_count == 0`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A cached JSON value with an absolute expiry.
///
/// ```
/// use chrono::Utc;
/// use serde_json::json;
/// use std::time::Duration;
/// use tally_core::CacheEntry;
///
/// let now = Utc::now();
/// let entry = CacheEntry::new(json!({"views": 3}), now, Duration::from_secs(60));
///
/// assert!(entry.is_live(now));
/// assert_eq!(entry.expires_at_epoch_ms(), now.timestamp_millis() + 60_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    value: Value,
    expires_at_epoch_ms: i64,
    #[serde(default)]
    hit_count: u64,
}

impl CacheEntry {
    /// Creates an entry written at `now` that lives for `ttl`.
    pub fn new(value: Value, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            value,
            expires_at_epoch_ms: now.timestamp_millis().saturating_add(ttl_ms),
            hit_count: 0,
        }
    }

    /// Returns a reference to the cached payload.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the entry and returns the payload.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Absolute expiry in milliseconds since the Unix epoch.
    #[inline]
    pub fn expires_at_epoch_ms(&self) -> i64 {
        self.expires_at_epoch_ms
    }

    /// Number of live reads served from this entry.
    #[inline]
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// Records one more live read.
    pub fn record_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }

    /// An entry is live iff its expiry is strictly in the future.
    #[inline]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_epoch_ms > now.timestamp_millis()
    }

    /// Time left until expiry, or `None` once expired.
    pub fn ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        let remaining = self.expires_at_epoch_ms - now.timestamp_millis();
        (remaining > 0).then(|| Duration::from_millis(remaining as u64))
    }

    /// Replaces the payload, keeping expiry and hit count.
    ///
    /// Used by counters that expire on first touch: the window is fixed when
    /// the entry is created and incrementing must not extend it.
    pub fn with_value(self, value: Value) -> Self {
        Self { value, ..self }
    }
}
