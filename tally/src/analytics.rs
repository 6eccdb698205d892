//! Page-view, activity and cache statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_backend::TypedStore;
use tally_core::SharedClock;
use tally_file::{CacheSummary, DurableStore, StatsSnapshot};

use crate::accounted::AccountedStore;

/// Cache key of the memoized [`CachePerformance`] report.
pub const CACHE_PERFORMANCE_KEY: &str = "cache_performance";

/// How long a [`CachePerformance`] report is reused.
pub const CACHE_PERFORMANCE_TTL: Duration = Duration::from_secs(60);

/// Cache accounting as of `generated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePerformance {
    /// Hit/miss counters of cache reads across all tiers.
    #[serde(flatten)]
    pub summary: CacheSummary,
    /// When the report was computed.
    pub generated_at: DateTime<Utc>,
}

/// Analytics over the durable document.
///
/// Obtained from [`Tally::analytics`](crate::Tally::analytics). Tracking
/// always lands in the durable document, whichever tier serves the cache.
#[derive(Debug, Clone)]
pub struct Analytics {
    durable: DurableStore,
    cache: AccountedStore,
    clock: SharedClock,
}

impl Analytics {
    pub(crate) fn new(durable: DurableStore, cache: AccountedStore, clock: SharedClock) -> Self {
        Self {
            durable,
            cache,
            clock,
        }
    }

    /// Counts one visit of `page`, overall and for today.
    pub async fn track_page_view(&self, page: &str) {
        self.durable.track_page_view(page).await;
    }

    /// Marks `user` as active now.
    pub async fn track_user_activity(&self, user: &str) {
        self.durable.track_user_activity(user).await;
    }

    /// Page, user and cache statistics from the durable document.
    pub async fn stats(&self) -> StatsSnapshot {
        self.durable.stats().await
    }

    /// Cache summary, recomputed at most once per
    /// [`CACHE_PERFORMANCE_TTL`].
    ///
    /// The report itself is cached through the tier chain, so reading it
    /// is a cache read like any other.
    pub async fn cache_performance(&self) -> CachePerformance {
        let durable = self.durable.clone();
        let clock = self.clock.clone();
        self.cache
            .get_or_compute(CACHE_PERFORMANCE_KEY, CACHE_PERFORMANCE_TTL, || async move {
                CachePerformance {
                    summary: durable.stats().await.cache,
                    generated_at: clock.now(),
                }
            })
            .await
    }
}
