//! Facade metrics.
//!
//! Tier-level counters live in `tally_backend::metrics`; this module only
//! tracks what the facade itself decides.
//!
//! - `tally_degraded_total` - calls answered with a default because every
//!   tier failed

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of calls answered with a default value.
    pub static ref DEGRADED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "tally_degraded_total",
            "Total number of facade calls answered with a default because every tier failed."
        );
        "tally_degraded_total"
    };
}

/// Record a call answered with a default.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_degraded(op: &'static str) {
    metrics::counter!(*DEGRADED_COUNTER, "op" => op).increment(1);
}

/// Record a degraded call (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_degraded(_op: &'static str) {}
