use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_backend::RateLimitStrategy;
use tally_redis::RetryPolicy;

use crate::ConfigError;

/// Environment variable holding the accelerator URL.
pub const REDIS_URL_VAR: &str = "REDIS_URL";

/// Environment variable holding the durable document directory.
pub const DATA_DIR_VAR: &str = "DATA_DIR";

/// Top-level configuration of a [`Tally`](crate::Tally).
///
/// Every section and field has a default, so an empty YAML document is a
/// valid configuration. Durations use humantime notation (`"50ms"`, `"30s"`,
/// `"24h"`).
///
/// ```yaml
/// accelerator:
///   url: redis://127.0.0.1:6379/
///   cooldown: 1m
/// storage:
///   data_dir: /var/lib/myapp
/// rate_limit:
///   limit: 20
///   window: 1m
///   strategy: FixedWindow
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TallyConfig {
    /// Optional Redis tier.
    pub accelerator: AcceleratorConfig,
    /// File-backed document tier.
    pub storage: StorageConfig,
    /// In-process last-resort tier.
    pub memory: MemoryConfig,
    /// Defaults for [`Tally::check_default_rate_limit`](crate::Tally::check_default_rate_limit).
    pub rate_limit: RateLimitConfig,
    /// Session storage.
    pub sessions: SessionConfig,
}

impl TallyConfig {
    /// Defaults overridden by `REDIS_URL` and `DATA_DIR`.
    pub fn from_env() -> Self {
        Self::default().with_env(|name| std::env::var(name).ok())
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(url) = lookup(REDIS_URL_VAR) {
            self.accelerator.url = Some(url);
        }
        if let Some(dir) = lookup(DATA_DIR_VAR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|error| ConfigError::Yaml(error.to_string()))
    }
}

/// Redis tier settings. Without a `url` the tier is skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AcceleratorConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/`.
    pub url: Option<String>,
    /// Connection retries before the tier gives up.
    pub max_retries: u32,
    /// Delay before the first retry (e.g., "50ms").
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound for a single retry delay (e.g., "2s").
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// How long the tier stays unavailable after giving up (e.g., "30s").
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            url: None,
            max_retries: retry.max_retries,
            base_delay: retry.base_delay,
            max_delay: retry.max_delay,
            cooldown: retry.cooldown,
        }
    }
}

impl AcceleratorConfig {
    /// The connection retry schedule.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            cooldown: self.cooldown,
        }
    }
}

/// Durable document settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// When false nothing is written to disk: cache calls fall to the
    /// memory tier and analytics live in an in-memory document.
    pub enabled: bool,
    /// Directory of the document file. Defaults to the system temp dir.
    pub data_dir: PathBuf,
    /// Document file name.
    pub file_name: String,
    /// How long the in-memory mirror is trusted (e.g., "1s", "250ms").
    #[serde(with = "humantime_serde")]
    pub mirror_window: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: std::env::temp_dir(),
            file_name: tally_file::DEFAULT_FILE_NAME.to_owned(),
            mirror_window: tally_file::DEFAULT_MIRROR_WINDOW,
        }
    }
}

impl StorageConfig {
    /// Full path of the document file.
    pub fn file_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}

/// In-process tier settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Capacity of the in-process cache.
    pub max_entries: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: tally_moka::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Rate-limit defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Attempts allowed per window.
    pub limit: u64,
    /// Window length (e.g., "60s", "1m").
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Windowing scheme.
    pub strategy: RateLimitStrategy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(60),
            strategy: RateLimitStrategy::default(),
        }
    }
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime (e.g., "24h").
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86_400),
        }
    }
}
