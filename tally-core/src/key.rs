//! Key namespaces.
//!
//! Every tier stores counters, rate-limit state and sessions in one flat key
//! space, so each kind of record gets its own prefix:
//!
//! | Namespace                | Format               |
//! |--------------------------|----------------------|
//! | [`Namespace::Counter`]   | `counter:{name}`     |
//! | [`Namespace::RateLog`]   | `ratelimit:{id}`     |
//! | [`Namespace::RateWindow`]| `rate_limit:{id}`    |
//! | [`Namespace::Session`]   | `session:{id}`       |
//!
//! ```
//! use tally_core::Namespace;
//!
//! assert_eq!(Namespace::Session.key("abc"), "session:abc");
//! assert_eq!(Namespace::RateLog.key("10.0.0.1"), "ratelimit:10.0.0.1");
//! ```

/// Prefix families used for synthetic keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Named monotonic counters on tiers that keep them in the key space.
    Counter,
    /// Sliding-log rate limiter attempts.
    RateLog,
    /// Fixed-window rate limiter counters.
    RateWindow,
    /// Session payloads.
    Session,
}

impl Namespace {
    /// The prefix including the trailing separator.
    pub const fn prefix(self) -> &'static str {
        match self {
            Namespace::Counter => "counter:",
            Namespace::RateLog => "ratelimit:",
            Namespace::RateWindow => "rate_limit:",
            Namespace::Session => "session:",
        }
    }

    /// Builds the full key for `id` in this namespace.
    pub fn key(self, id: &str) -> String {
        let prefix = self.prefix();
        let mut key = String::with_capacity(prefix.len() + id.len());
        key.push_str(prefix);
        key.push_str(id);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_namespaces_do_not_collide() {
        let log = Namespace::RateLog.key("user");
        let window = Namespace::RateWindow.key("user");
        assert_ne!(log, window);
        assert!(!log.starts_with(Namespace::RateWindow.prefix()));
        assert!(!window.starts_with(Namespace::RateLog.prefix()));
    }

    #[test]
    fn test_counter_key() {
        assert_eq!(Namespace::Counter.key("total_views"), "counter:total_views");
    }
}
