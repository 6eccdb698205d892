//! Per-identifier request throttling on top of any [`Store`].
//!
//! Two strategies are available:
//!
//! - [`RateLimitStrategy::SlidingLog`] (default) keeps the attempt timestamps
//!   of the trailing window under `ratelimit:{id}`. Old attempts drop out one
//!   by one, so there is no burst at window boundaries.
//! - [`RateLimitStrategy::FixedWindow`] counts attempts under
//!   `rate_limit:{id}` with an expiry set on the first attempt. One store
//!   round-trip per check, suited to the accelerator tier.
//!
//! Neither strategy locks: two concurrent checks for the same identifier may
//! both be admitted when only one slot is left.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::{Namespace, SharedClock};
use tracing::{debug, warn};

use crate::{Store, StoreResult, metrics};

/// Windowing scheme used by a [`RateLimiter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitStrategy {
    /// Timestamp log over the trailing window.
    #[default]
    SlidingLog,
    /// Counter that resets when its window expires.
    FixedWindow,
}

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u64,
}

impl RateLimitDecision {
    /// Decision used when no tier could be consulted: let the request
    /// through with the full budget.
    pub fn fail_open(limit: u64) -> Self {
        Self {
            allowed: true,
            remaining: limit,
        }
    }
}

/// Rate limiter parameterized by strategy and clock.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    strategy: RateLimitStrategy,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(strategy: RateLimitStrategy, clock: SharedClock) -> Self {
        Self { strategy, clock }
    }

    /// Sliding-log limiter.
    pub fn sliding_log(clock: SharedClock) -> Self {
        Self::new(RateLimitStrategy::SlidingLog, clock)
    }

    pub fn strategy(&self) -> RateLimitStrategy {
        self.strategy
    }

    /// Checks and records one attempt for `id`.
    pub async fn check<S>(
        &self,
        store: &S,
        id: &str,
        limit: u64,
        window: Duration,
    ) -> StoreResult<RateLimitDecision>
    where
        S: Store + ?Sized,
    {
        let decision = match self.strategy {
            RateLimitStrategy::SlidingLog => self.check_log(store, id, limit, window).await?,
            RateLimitStrategy::FixedWindow => self.check_window(store, id, limit, window).await?,
        };
        debug!(
            id,
            limit,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "rate limit checked"
        );
        metrics::record_rate_limit(decision.allowed);
        Ok(decision)
    }

    async fn check_log<S>(
        &self,
        store: &S,
        id: &str,
        limit: u64,
        window: Duration,
    ) -> StoreResult<RateLimitDecision>
    where
        S: Store + ?Sized,
    {
        let key = Namespace::RateLog.key(id);
        let now = self.clock.now_millis();
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let window_start = now.saturating_sub(window_ms);

        let mut attempts: Vec<i64> = match store.peek(&key).await? {
            Some(value) => decode_log(&key, value),
            None => Vec::new(),
        };
        attempts.retain(|&at| at > window_start);

        if attempts.len() as u64 >= limit {
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
            });
        }

        attempts.push(now);
        let count = attempts.len() as u64;
        store.write(&key, Value::from(attempts), window).await?;

        Ok(RateLimitDecision {
            allowed: true,
            remaining: limit - count,
        })
    }

    async fn check_window<S>(
        &self,
        store: &S,
        id: &str,
        limit: u64,
        window: Duration,
    ) -> StoreResult<RateLimitDecision>
    where
        S: Store + ?Sized,
    {
        let key = Namespace::RateWindow.key(id);
        let count = store.increment_with_expiry(&key, window).await?;
        Ok(RateLimitDecision {
            allowed: count <= limit,
            remaining: limit.saturating_sub(count),
        })
    }
}

fn decode_log(key: &str, value: Value) -> Vec<i64> {
    match serde_json::from_value(value) {
        Ok(attempts) => attempts,
        Err(error) => {
            warn!(key, %error, "discarding malformed rate-limit log");
            Vec::new()
        }
    }
}
