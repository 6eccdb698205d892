//! Traits and structs for Tally storage tiers.
//!
//! If you want to implement your own tier, you are in the right place:
//! implement [`Store`] and it gains typed access ([`TypedStore`]), can be
//! placed in a [`FallbackStore`] chain and can back a [`RateLimiter`].
mod error;
mod store;
mod typed;

pub mod composition;
pub mod metrics;
pub mod rate_limit;

pub use composition::{FallbackStore, Served};
pub use error::{DeleteStatus, StoreError};
pub use rate_limit::{RateLimitDecision, RateLimitStrategy, RateLimiter};
pub use store::{Store, StoreResult};
pub use typed::TypedStore;
