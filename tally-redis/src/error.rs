//! Error types for the accelerator tier.
//!
//! Every error converts into [`StoreError`] so a fallback chain can handle
//! the accelerator like any other tier.
//!
//! [`StoreError`]: tally_backend::StoreError

use redis::RedisError;
use tally_backend::StoreError;

/// Error type for accelerator operations.
///
/// You typically don't handle this error directly. It appears when:
///
/// - Building an [`AcceleratorStore`](crate::AcceleratorStore) with an
///   invalid connection URL
/// - A command fails on an established connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("Redis accelerator error: {0}")]
    Redis(#[from] RedisError),
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        match &error {
            Error::Redis(e) if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() => {
                Self::Connection(Box::new(error))
            }
            Error::Redis(_) => Self::Internal(Box::new(error)),
        }
    }
}
