//! Error types for store operations.

use tally_core::StoreLabel;
use thiserror::Error;

/// Error type for store operations.
///
/// This enum categorizes errors that can occur during tier interactions so the
/// fallback chain can tell "tier switched off" apart from "tier misbehaved".
#[derive(Debug, Error)]
pub enum StoreError {
    /// The tier is not configured or has been marked unavailable.
    ///
    /// Expected in degraded deployments; the chain moves on without logging
    /// at warning level.
    #[error("store `{0}` is unavailable")]
    Unavailable(StoreLabel),

    /// Network interaction error on an established connection.
    ///
    /// Errors occurring during communication with remote tiers (e.g., Redis).
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),

    /// Internal tier error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),

    /// Payload serialization or deserialization error.
    #[error(transparent)]
    Format(#[from] serde_json::Error),

    /// Every tier of a fallback chain failed.
    #[error("all tiers failed during `{op}`")]
    Exhausted {
        /// Operation name.
        op: &'static str,
        /// Error reported by the last tier tried.
        #[source]
        last: Option<Box<StoreError>>,
    },
}

impl StoreError {
    /// Whether this error only says the tier is switched off.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Status of deleting result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}
