//! Clock abstraction.
//!
//! Expiry, mirror freshness and rate-limit windows are all computed against a
//! [`Clock`] so that stores can be driven by a [`ManualClock`] in tests
//! instead of sleeping.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;

/// Source of the current wall-clock time.
pub trait Clock: Debug + Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl SystemClock {
    /// A shared handle to the system clock.
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-helpers"))]
mod manual {
    use super::Clock;
    use chrono::{DateTime, Utc};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A clock that only moves when told to.
    ///
    /// Clones share the same instant.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Starts at `start`.
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(start)),
            }
        }

        /// Starts at the current wall-clock time.
        pub fn starting_now() -> Self {
            Self::new(Utc::now())
        }

        /// Moves the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
            *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        }

        /// Jumps to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(|e| e.into_inner())
        }
    }
}
