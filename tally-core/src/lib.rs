#![warn(missing_docs)]
//! # tally-core
//!
//! Core types for the Tally tiered cache, counter and rate-limit store.
//!
//! This crate holds the vocabulary every storage tier shares:
//!
//! - [`CacheEntry`] - a JSON payload with absolute expiry and hit count
//! - [`StoreLabel`] - identifies which tier served a call
//! - [`Namespace`] - prefixes for synthetic keys (counters, rate limits, sessions)
//! - [`Clock`] - time source, swappable for tests
//!
//! ## Feature Flags
//!
//! - `test-helpers` - Export [`ManualClock`](time::ManualClock) for integration tests
//!

pub mod key;
pub mod label;
pub mod time;
pub mod value;

pub use key::Namespace;
pub use label::StoreLabel;
#[cfg(any(test, feature = "test-helpers"))]
pub use time::ManualClock;
pub use time::{Clock, SharedClock, SystemClock};
pub use value::CacheEntry;
