//! In-memory test stores shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tally_backend::{DeleteStatus, Store, StoreError, StoreResult};
use tally_core::{CacheEntry, Clock, ManualClock, StoreLabel};

/// Simple in-memory store for testing using DashMap.
///
/// Clones share entries, counters and the clock.
#[derive(Clone, Debug)]
pub struct TestStore {
    entries: Arc<DashMap<String, CacheEntry>>,
    counters: Arc<DashMap<String, u64>>,
    reads: Arc<AtomicUsize>,
    peeks: Arc<AtomicUsize>,
    clock: ManualClock,
    label: StoreLabel,
}

impl TestStore {
    pub fn new(label: &str, clock: ManualClock) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            counters: Arc::new(DashMap::new()),
            reads: Arc::new(AtomicUsize::new(0)),
            peeks: Arc::new(AtomicUsize::new(0)),
            clock,
            label: StoreLabel::from(label),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn peeks(&self) -> usize {
        self.peeks.load(Ordering::SeqCst)
    }

    fn live(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?.clone();
        if entry.is_live(self.clock.now()) {
            Some(entry)
        } else {
            self.entries.remove(key);
            None
        }
    }
}

#[async_trait]
impl Store for TestStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.live(key).map(CacheEntry::into_value))
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        Ok(self.live(key).map(CacheEntry::into_value))
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        Ok(match self.entries.remove(key) {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        let mut count = self.counters.entry(name.to_owned()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        Ok(self.counters.get(name).map(|c| *c).unwrap_or(0))
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        let entry = match self.live(key) {
            Some(existing) => {
                let next = existing.value().as_u64().unwrap_or(0) + 1;
                existing.with_value(Value::from(next))
            }
            None => CacheEntry::new(Value::from(1u64), self.clock.now(), ttl),
        };
        let count = entry.value().as_u64().unwrap_or(0);
        self.entries.insert(key.to_owned(), entry);
        Ok(count)
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }
}

/// Store whose every call fails, either as "unavailable" or with an
/// internal error.
#[derive(Clone, Debug)]
pub struct BrokenStore {
    label: StoreLabel,
    unavailable: bool,
    calls: Arc<AtomicUsize>,
}

impl BrokenStore {
    pub fn failing(label: &str) -> Self {
        Self {
            label: StoreLabel::from(label),
            unavailable: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unavailable(label: &str) -> Self {
        Self {
            unavailable: true,
            ..Self::failing(label)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            Err(StoreError::Unavailable(self.label.clone()))
        } else {
            Err(StoreError::Internal(Box::new(std::io::Error::other(
                "disk full",
            ))))
        }
    }
}

#[async_trait]
impl Store for BrokenStore {
    async fn read(&self, _key: &str) -> StoreResult<Option<Value>> {
        self.fail()
    }

    async fn write(&self, _key: &str, _value: Value, _ttl: Duration) -> StoreResult<()> {
        self.fail()
    }

    async fn remove(&self, _key: &str) -> StoreResult<DeleteStatus> {
        self.fail()
    }

    async fn increment(&self, _name: &str) -> StoreResult<u64> {
        self.fail()
    }

    async fn counter(&self, _name: &str) -> StoreResult<u64> {
        self.fail()
    }

    async fn increment_with_expiry(&self, _key: &str, _ttl: Duration) -> StoreResult<u64> {
        self.fail()
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }
}
