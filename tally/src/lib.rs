#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Page-view, activity and cache statistics.
///
/// [`Analytics`](analytics::Analytics) tracks visits and active users in the
/// durable document and produces the memoized
/// [`CachePerformance`](analytics::CachePerformance) report.
pub mod analytics;

mod accounted;

/// Configuration types.
///
/// [`TallyConfig`] is deserialized from YAML or assembled from defaults and
/// the `REDIS_URL` / `DATA_DIR` environment variables.
pub mod config;

mod error;
mod facade;

/// Tier health report returned by [`Tally::health`].
pub mod health;

/// Metrics collection for facade observability.
///
/// When the `metrics` feature is enabled, this module counts calls that
/// were answered with a default because every tier failed. Tier metrics
/// are enabled alongside.
pub mod metrics;

pub use analytics::{Analytics, CachePerformance};
pub use config::TallyConfig;
pub use error::ConfigError;
pub use facade::{DEFAULT_CACHE_TTL, Tally, TallyBuilder};
pub use health::{AcceleratorHealth, Health};

pub use tally_backend::{
    DeleteStatus, FallbackStore, RateLimitDecision, RateLimitStrategy, RateLimiter, Served, Store,
    StoreError, StoreResult, TypedStore,
};
pub use tally_core::{CacheEntry, Clock, Namespace, SharedClock, StoreLabel, SystemClock};
pub use tally_file::{CacheSummary, PageViews, StatsSnapshot, StorageDocument};
