mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{BrokenStore, TestStore};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use tally_backend::{StoreError, TypedStore};
use tally_core::ManualClock;

const TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Homepage {
    title: String,
    posts: Vec<u32>,
}

fn homepage() -> Homepage {
    Homepage {
        title: "Welcome".to_owned(),
        posts: vec![1, 2, 3],
    }
}

#[tokio::test]
async fn test_typed_set_then_get() {
    let store = TestStore::new("memory", ManualClock::starting_now());

    store.set("homepage", &homepage(), TTL).await.unwrap();
    let cached: Option<Homepage> = store.get("homepage").await.unwrap();

    assert_eq!(cached, Some(homepage()));
}

#[tokio::test]
async fn test_get_with_wrong_shape_is_format_error() {
    let store = TestStore::new("memory", ManualClock::starting_now());
    store.set("homepage", &"just a string", TTL).await.unwrap();

    let result = store.get::<Homepage>("homepage").await;
    assert!(matches!(result, Err(StoreError::Format(_))));
}

#[tokio::test]
async fn test_get_or_compute_runs_once_while_live() {
    let clock = ManualClock::starting_now();
    let store = TestStore::new("memory", clock.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = calls.clone();
        let page = store
            .get_or_compute("homepage", TTL, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                homepage()
            })
            .await;
        assert_eq!(page, homepage());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(TTL);
    let calls_after = calls.clone();
    store
        .get_or_compute("homepage", TTL, || async move {
            calls_after.fetch_add(1, Ordering::SeqCst);
            homepage()
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_get_or_compute_survives_broken_store() {
    let store = BrokenStore::failing("durable");

    let page = store.get_or_compute("homepage", TTL, || async { homepage() }).await;

    assert_eq!(page, homepage());
    // one failed read, one failed write
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_try_get_or_compute_does_not_cache_errors() {
    let store = TestStore::new("memory", ManualClock::starting_now());

    let failed: Result<Homepage, &str> = store
        .try_get_or_compute("homepage", TTL, || async { Err("upstream down") })
        .await;
    assert_eq!(failed, Err("upstream down"));
    assert!(!store.has("homepage"));

    let ok: Result<Homepage, &str> = store
        .try_get_or_compute("homepage", TTL, || async { Ok(homepage()) })
        .await;
    assert_eq!(ok, Ok(homepage()));
    assert!(store.has("homepage"));
}
