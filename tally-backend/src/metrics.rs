//! Store metrics for the Tally tiers.
//!
//! This module provides metrics for tier routing and bookkeeping.
//! Enable the `metrics` feature to use these metrics.
//!
//! ## Naming Pattern
//!
//! All metrics follow the pattern: `tally_{component}_{event}_total`
//!
//! - `tally_store_served_total` - calls answered, per tier and operation
//! - `tally_store_fallback_total` - calls a tier failed and passed on
//! - `tally_store_cache_reads_total` - cache reads per tier, by hit/miss
//! - `tally_store_persist_errors_total` - swallowed durable write failures
//! - `tally_rate_limit_checks_total` - rate-limit decisions, by outcome

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for calls answered by a tier.
    pub static ref STORE_SERVED: &'static str = {
        metrics::describe_counter!(
            "tally_store_served_total",
            "Total number of store calls answered, per tier and operation."
        );
        "tally_store_served_total"
    };

    /// Metric name for calls a tier failed and passed down the chain.
    pub static ref STORE_FALLBACK: &'static str = {
        metrics::describe_counter!(
            "tally_store_fallback_total",
            "Total number of store calls that fell through a tier."
        );
        "tally_store_fallback_total"
    };

    /// Metric name for cache reads by outcome.
    pub static ref STORE_CACHE_READS: &'static str = {
        metrics::describe_counter!(
            "tally_store_cache_reads_total",
            "Total number of cache reads per tier, labelled hit or miss."
        );
        "tally_store_cache_reads_total"
    };

    /// Metric name for failed durable writes.
    pub static ref STORE_PERSIST_ERRORS: &'static str = {
        metrics::describe_counter!(
            "tally_store_persist_errors_total",
            "Total number of durable document writes that failed."
        );
        "tally_store_persist_errors_total"
    };

    /// Metric name for rate-limit decisions.
    pub static ref RATE_LIMIT_CHECKS: &'static str = {
        metrics::describe_counter!(
            "tally_rate_limit_checks_total",
            "Total number of rate-limit checks, labelled by outcome."
        );
        "tally_rate_limit_checks_total"
    };
}

/// Record a call answered by `tier`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_served(tier: &str, op: &'static str) {
    metrics::counter!(*STORE_SERVED, "tier" => tier.to_string(), "op" => op).increment(1);
}

/// Record a call answered (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_served(_tier: &str, _op: &'static str) {}

/// Record a call that fell through `tier`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fallback(tier: &str, op: &'static str) {
    metrics::counter!(*STORE_FALLBACK, "tier" => tier.to_string(), "op" => op).increment(1);
}

/// Record a fall-through (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fallback(_tier: &str, _op: &'static str) {}

/// Record a cache read on `tier`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_cache_read(tier: &str, hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    metrics::counter!(*STORE_CACHE_READS, "tier" => tier.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record a cache read (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_cache_read(_tier: &str, _hit: bool) {}

/// Record a failed durable write on `tier`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_persist_error(tier: &str) {
    metrics::counter!(*STORE_PERSIST_ERRORS, "tier" => tier.to_string()).increment(1);
}

/// Record a failed durable write (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_persist_error(_tier: &str) {}

/// Record a rate-limit decision.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_rate_limit(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    metrics::counter!(*RATE_LIMIT_CHECKS, "outcome" => outcome).increment(1);
}

/// Record a rate-limit decision (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_rate_limit(_allowed: bool) {}
