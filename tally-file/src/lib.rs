#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod document;
mod error;
mod io;
mod stats;
mod store;

pub use document::{
    ACTIVITY_WINDOW, AnalyticsData, CacheStats, DEFAULT_COUNTERS, SAVED_MS_PER_HIT,
    StorageDocument,
};
pub use error::DocumentError;
pub use stats::{CacheSummary, PageViews, StatsSnapshot};
pub use store::{DEFAULT_FILE_NAME, DEFAULT_MIRROR_WINDOW, DurableStore, DurableStoreBuilder};
