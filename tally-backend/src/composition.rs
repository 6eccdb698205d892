//! Fallback chain over several storage tiers.
//!
//! [`FallbackStore`] holds an ordered list of tiers and routes every call to
//! the first tier that answers without error:
//!
//! ```text
//! accelerator (Redis) --err--> durable (file) --err--> memory (moka)
//!        |                          |                        |
//!      answer                     answer                   answer
//! ```
//!
//! A miss (`Ok(None)`) is an answer: the chain does not look further, since
//! writes always land on the first healthy tier and that is where the value
//! would be. Only errors fall through. Which tier answered is reported with
//! [`Served`], logged, and counted in the `metrics` feature.
//!
//! # Example
//! ```ignore
//! use tally_backend::FallbackStore;
//!
//! let chain = FallbackStore::new()
//!     .tier(accelerator)
//!     .tier(durable)
//!     .tier(memory);
//!
//! let served = chain.read_served("homepage").await?;
//! println!("{} answered", served.tier);
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tally_core::StoreLabel;
use tracing::{debug, trace, warn};

use crate::{DeleteStatus, Store, StoreError, StoreResult, metrics};

/// A value together with the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    /// The tier's answer.
    pub value: T,
    /// Label of the tier that answered.
    pub tier: StoreLabel,
}

impl<T> Served<T> {
    /// Drops the tier information.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Ordered chain of tiers; see the [module docs](self).
#[derive(Clone)]
pub struct FallbackStore {
    tiers: Vec<Arc<dyn Store>>,
    label: StoreLabel,
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FallbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackStore")
            .field("label", &self.label)
            .field("tiers", &self.labels())
            .finish()
    }
}

macro_rules! route {
    ($self:ident, $op:literal, |$tier:ident| $call:expr) => {{
        let mut last = None;
        for $tier in &$self.tiers {
            match $call.await {
                Ok(value) => return Ok($self.served($tier.label(), $op, value)),
                Err(error) => last = Some($self.fall_through($tier.label(), $op, error)),
            }
        }
        Err(StoreError::Exhausted {
            op: $op,
            last: last.map(Box::new),
        })
    }};
}

impl FallbackStore {
    /// Creates an empty chain. Every call on an empty chain is
    /// [`StoreError::Exhausted`].
    pub fn new() -> Self {
        Self {
            tiers: Vec::new(),
            label: StoreLabel::new_static("tiered"),
        }
    }

    /// Appends a tier; earlier tiers are preferred.
    pub fn tier(mut self, store: impl Store + 'static) -> Self {
        self.tiers.push(Arc::new(store));
        self
    }

    /// Appends an already shared tier.
    pub fn shared_tier(mut self, store: Arc<dyn Store>) -> Self {
        self.tiers.push(store);
        self
    }

    /// Set a custom name for this chain, used as the metrics prefix.
    pub fn name(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Labels of the tiers in preference order.
    pub fn labels(&self) -> Vec<StoreLabel> {
        self.tiers.iter().map(|tier| tier.label()).collect()
    }

    fn served<T>(&self, tier: StoreLabel, op: &'static str, value: T) -> Served<T> {
        trace!(chain = %self.label, %tier, op, "tier answered");
        metrics::record_served(self.label.compose(&tier).as_str(), op);
        Served { value, tier }
    }

    fn fall_through(&self, tier: StoreLabel, op: &'static str, error: StoreError) -> StoreError {
        if error.is_unavailable() {
            debug!(chain = %self.label, %tier, op, "tier unavailable, falling back");
        } else {
            warn!(chain = %self.label, %tier, op, %error, "tier failed, falling back");
        }
        metrics::record_fallback(self.label.compose(&tier).as_str(), op);
        error
    }

    #[tracing::instrument(skip(self), level = "trace")]
    pub async fn read_served(&self, key: &str) -> StoreResult<Served<Option<Value>>> {
        route!(self, "read", |tier| tier.read(key))
    }

    #[tracing::instrument(skip(self), level = "trace")]
    pub async fn peek_served(&self, key: &str) -> StoreResult<Served<Option<Value>>> {
        route!(self, "peek", |tier| tier.peek(key))
    }

    #[tracing::instrument(skip(self, value), level = "trace")]
    pub async fn write_served(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> StoreResult<Served<()>> {
        route!(self, "write", |tier| tier.write(key, value.clone(), ttl))
    }

    #[tracing::instrument(skip(self), level = "trace")]
    pub async fn remove_served(&self, key: &str) -> StoreResult<Served<DeleteStatus>> {
        route!(self, "remove", |tier| tier.remove(key))
    }

    #[tracing::instrument(skip(self), level = "trace")]
    pub async fn increment_served(&self, name: &str) -> StoreResult<Served<u64>> {
        route!(self, "increment", |tier| tier.increment(name))
    }

    #[tracing::instrument(skip(self), level = "trace")]
    pub async fn counter_served(&self, name: &str) -> StoreResult<Served<u64>> {
        route!(self, "counter", |tier| tier.counter(name))
    }

    #[tracing::instrument(skip(self), level = "trace")]
    pub async fn increment_with_expiry_served(
        &self,
        key: &str,
        ttl: Duration,
    ) -> StoreResult<Served<u64>> {
        route!(self, "increment_with_expiry", |tier| tier
            .increment_with_expiry(key, ttl))
    }
}

#[async_trait]
impl Store for FallbackStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        self.read_served(key).await.map(Served::into_inner)
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<Value>> {
        self.peek_served(key).await.map(Served::into_inner)
    }

    async fn write(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()> {
        self.write_served(key, value, ttl)
            .await
            .map(Served::into_inner)
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        self.remove_served(key).await.map(Served::into_inner)
    }

    async fn increment(&self, name: &str) -> StoreResult<u64> {
        self.increment_served(name).await.map(Served::into_inner)
    }

    async fn counter(&self, name: &str) -> StoreResult<u64> {
        self.counter_served(name).await.map(Served::into_inner)
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        self.increment_with_expiry_served(key, ttl)
            .await
            .map(Served::into_inner)
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }
}
