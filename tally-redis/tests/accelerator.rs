//! Accelerator availability rules.
//!
//! Tests that need a live server read its URL from `TALLY_TEST_REDIS_URL`
//! and are skipped when it is unset.

use std::time::Duration;

use serde_json::json;
use tally_backend::{DeleteStatus, FallbackStore, Store, StoreError};
use tally_core::StoreLabel;
use tally_moka::MemoryStore;
use tally_redis::{AcceleratorStore, RetryPolicy};

fn fast_retry(cooldown: Duration) -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        cooldown,
    }
}

fn unreachable(cooldown: Duration) -> AcceleratorStore {
    AcceleratorStore::builder()
        .url("redis://127.0.0.1:1/")
        .retry(fast_retry(cooldown))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_without_url_every_call_is_unavailable() {
    let accelerator = AcceleratorStore::builder().build().unwrap();

    assert!(!accelerator.is_configured());
    assert!(!accelerator.is_available().await);
    assert!(matches!(
        accelerator.read("k").await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(matches!(
        accelerator.increment("total_views").await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(accelerator.ping().await.is_err());
}

#[tokio::test]
async fn test_unreachable_server_marks_unavailable() {
    let accelerator = unreachable(Duration::from_secs(60));

    assert!(accelerator.is_available().await);
    let error = accelerator.write("k", json!(1), Duration::from_secs(5)).await;
    assert!(matches!(error, Err(StoreError::Unavailable(_))));
    assert!(!accelerator.is_available().await);

    // short-circuits while cooling down
    let started = std::time::Instant::now();
    assert!(accelerator.read("k").await.unwrap_err().is_unavailable());
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn test_cooldown_elapses() {
    let accelerator = unreachable(Duration::from_millis(20));

    assert!(accelerator.counter("views").await.is_err());
    assert!(!accelerator.is_available().await);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(accelerator.is_available().await);
}

#[tokio::test]
async fn test_concurrent_calls_do_not_wait_for_reconnect() {
    let accelerator = AcceleratorStore::builder()
        .url("redis://127.0.0.1:1/")
        .retry(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            cooldown: Duration::from_secs(60),
        })
        .build()
        .unwrap();

    let retrying = tokio::spawn({
        let accelerator = accelerator.clone();
        async move { accelerator.read("k").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let read = tokio::time::timeout(Duration::from_millis(200), accelerator.read("k"))
        .await
        .expect("read waited on the connect loop");
    assert!(matches!(read, Err(StoreError::Unavailable(_))));
    let available = tokio::time::timeout(Duration::from_millis(200), accelerator.is_available())
        .await
        .expect("availability waited on the connect loop");
    assert!(!available);

    // dropping the retrying caller lets the next call try again
    retrying.abort();
    assert!(retrying.await.unwrap_err().is_cancelled());
    assert!(accelerator.is_available().await);
}

#[tokio::test]
async fn test_chain_falls_back_to_memory() {
    let memory = MemoryStore::default();
    let chain = FallbackStore::new()
        .tier(unreachable(Duration::from_secs(60)))
        .tier(memory.clone());

    let written = chain
        .write_served("homepage", json!({"hero": "hi"}), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(written.tier, StoreLabel::from("memory"));

    let read = chain.read_served("homepage").await.unwrap();
    assert_eq!(read.tier, StoreLabel::from("memory"));
    assert_eq!(read.value, Some(json!({"hero": "hi"})));
}

#[tokio::test]
async fn test_live_server_round_trip() {
    let Ok(url) = std::env::var("TALLY_TEST_REDIS_URL") else {
        return;
    };
    let accelerator = AcceleratorStore::builder().url(url).build().unwrap();
    let suffix = std::process::id();
    let key = format!("tally-test:{suffix}");

    accelerator
        .write(&key, json!({"a": [1, 2]}), Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(accelerator.read(&key).await.unwrap(), Some(json!({"a": [1, 2]})));
    assert_eq!(accelerator.remove(&key).await.unwrap(), DeleteStatus::Deleted(1));
    assert_eq!(accelerator.remove(&key).await.unwrap(), DeleteStatus::Missing);

    let counter = format!("tally-test-counter-{suffix}");
    let first = accelerator.increment(&counter).await.unwrap();
    assert_eq!(accelerator.counter(&counter).await.unwrap(), first);

    let window = format!("rate_limit:tally-test-{suffix}");
    assert_eq!(accelerator.increment_with_expiry(&window, Duration::from_secs(5)).await.unwrap(), 1);
    assert_eq!(accelerator.increment_with_expiry(&window, Duration::from_secs(5)).await.unwrap(), 2);

    assert!(accelerator.ping().await.is_ok());
    accelerator.close().await;
    assert!(accelerator.ping().await.is_ok());
    accelerator.remove(&window).await.unwrap();
}
