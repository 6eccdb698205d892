//! Memory tier capacity metrics.
//!
//! Enable the `metrics` feature to use these metrics.
//!
//! ## Metrics
//!
//! - `tally_memory_entries` - Current number of cached values (gauge)
//! - `tally_memory_counters` - Current number of named counters (gauge)
//!
//! Both metrics carry a `tier` label to distinguish between several memory
//! stores.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for the cached value gauge.
    pub static ref MEMORY_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "tally_memory_entries",
            "Current number of values held by the memory tier."
        );
        "tally_memory_entries"
    };

    /// Metric name for the counter gauge.
    pub static ref MEMORY_COUNTERS: &'static str = {
        metrics::describe_gauge!(
            "tally_memory_counters",
            "Current number of named counters held by the memory tier."
        );
        "tally_memory_counters"
    };
}

/// Record current memory tier size.
///
/// # Arguments
///
/// * `tier` - Store label for metric identification
/// * `entries` - Current number of cached values
/// * `counters` - Current number of named counters
#[cfg(feature = "metrics")]
#[inline]
pub fn record_size(tier: &str, entries: u64, counters: u64) {
    metrics::gauge!(*MEMORY_ENTRIES, "tier" => tier.to_string()).set(entries as f64);
    metrics::gauge!(*MEMORY_COUNTERS, "tier" => tier.to_string()).set(counters as f64);
}

/// Record current memory tier size (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_size(_tier: &str, _entries: u64, _counters: u64) {}
