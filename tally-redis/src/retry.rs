//! Connection retry schedule.

use std::time::Duration;

/// How the accelerator retries a failed connection attempt.
///
/// The `n`-th retry waits `base_delay * 2^(n-1)`, capped at `max_delay`.
/// After `max_retries` failed retries the tier stays unavailable for
/// `cooldown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// How long to stay unavailable after giving up.
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(2000),
            cooldown: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (1..=8).map(|n| policy.delay(n).as_millis()).collect();
        assert_eq!(delays, vec![50, 100, 200, 400, 800, 1600, 2000, 2000]);
    }

    #[test]
    fn test_huge_retry_number_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(u32::MAX), policy.max_delay);
    }
}
