mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BrokenStore, TestStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use tally_backend::{RateLimitDecision, RateLimitStrategy, RateLimiter, Store};
use tally_core::ManualClock;

const WINDOW: Duration = Duration::from_secs(60);

fn decision(allowed: bool, remaining: u64) -> RateLimitDecision {
    RateLimitDecision { allowed, remaining }
}

#[tokio::test]
async fn test_sliding_log_counts_down_then_denies() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let limiter = RateLimiter::sliding_log(Arc::new(clock));

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(limiter.check(&store, "u", 3, WINDOW).await.unwrap());
    }

    assert_eq!(
        seen,
        vec![
            decision(true, 2),
            decision(true, 1),
            decision(true, 0),
            decision(false, 0),
        ]
    );
}

#[tokio::test]
async fn test_sliding_log_readmits_after_window() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let limiter = RateLimiter::sliding_log(Arc::new(clock.clone()));

    for _ in 0..3 {
        limiter.check(&store, "u", 3, WINDOW).await.unwrap();
    }
    assert!(!limiter.check(&store, "u", 3, WINDOW).await.unwrap().allowed);

    clock.advance(WINDOW + Duration::from_millis(1));
    assert_eq!(
        limiter.check(&store, "u", 3, WINDOW).await.unwrap(),
        decision(true, 2)
    );
}

#[tokio::test]
async fn test_sliding_log_drops_attempts_one_by_one() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let limiter = RateLimiter::sliding_log(Arc::new(clock.clone()));

    limiter.check(&store, "u", 2, WINDOW).await.unwrap();
    clock.advance(Duration::from_secs(30));
    limiter.check(&store, "u", 2, WINDOW).await.unwrap();
    assert!(!limiter.check(&store, "u", 2, WINDOW).await.unwrap().allowed);

    // the first attempt leaves the window, the second stays
    clock.advance(Duration::from_secs(31));
    assert_eq!(
        limiter.check(&store, "u", 2, WINDOW).await.unwrap(),
        decision(true, 0)
    );
}

#[tokio::test]
async fn test_denied_attempts_are_not_logged() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let limiter = RateLimiter::sliding_log(Arc::new(clock));

    limiter.check(&store, "u", 1, WINDOW).await.unwrap();
    limiter.check(&store, "u", 1, WINDOW).await.unwrap();
    limiter.check(&store, "u", 1, WINDOW).await.unwrap();

    let log = store.entry("ratelimit:u").unwrap();
    assert_eq!(log.value().as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_identifiers_are_independent() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let limiter = RateLimiter::sliding_log(Arc::new(clock));

    limiter.check(&store, "a", 1, WINDOW).await.unwrap();
    assert!(!limiter.check(&store, "a", 1, WINDOW).await.unwrap().allowed);
    assert!(limiter.check(&store, "b", 1, WINDOW).await.unwrap().allowed);
}

#[tokio::test]
async fn test_sliding_log_does_not_count_as_cache_reads() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let limiter = RateLimiter::sliding_log(Arc::new(clock));

    limiter.check(&store, "u", 5, WINDOW).await.unwrap();
    limiter.check(&store, "u", 5, WINDOW).await.unwrap();

    assert_eq!(store.reads(), 0);
    assert_eq!(store.peeks(), 2);
}

#[tokio::test]
async fn test_malformed_log_is_treated_as_empty() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    store.write("ratelimit:u", json!("garbage"), WINDOW).await.unwrap();

    let limiter = RateLimiter::sliding_log(Arc::new(clock));
    assert_eq!(
        limiter.check(&store, "u", 2, WINDOW).await.unwrap(),
        decision(true, 1)
    );
}

#[tokio::test]
async fn test_zero_limit_denies_everything() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let limiter = RateLimiter::sliding_log(Arc::new(clock));

    assert_eq!(
        limiter.check(&store, "u", 0, WINDOW).await.unwrap(),
        decision(false, 0)
    );
}

#[tokio::test]
async fn test_fixed_window_counts_and_resets() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("accelerator", clock.clone());
    let limiter = RateLimiter::new(RateLimitStrategy::FixedWindow, Arc::new(clock.clone()));

    assert_eq!(limiter.strategy(), RateLimitStrategy::FixedWindow);
    assert_eq!(limiter.check(&store, "u", 2, WINDOW).await.unwrap(), decision(true, 1));
    assert_eq!(limiter.check(&store, "u", 2, WINDOW).await.unwrap(), decision(true, 0));
    assert_eq!(limiter.check(&store, "u", 2, WINDOW).await.unwrap(), decision(false, 0));
    assert!(store.has("rate_limit:u"));

    clock.advance(WINDOW);
    assert_eq!(limiter.check(&store, "u", 2, WINDOW).await.unwrap(), decision(true, 1));
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let clock = ManualClock::starting_now();
    let limiter = RateLimiter::sliding_log(Arc::new(clock));
    let store = BrokenStore::failing("durable");

    assert!(limiter.check(&store, "u", 5, WINDOW).await.is_err());
    assert_eq!(RateLimitDecision::fail_open(5), decision(true, 5));
}
