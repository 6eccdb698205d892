//! Tier health report.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tally_core::StoreLabel;

/// State of every tier at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// Tiers of the cache chain in preference order.
    pub tiers: Vec<StoreLabel>,
    /// Redis tier.
    pub accelerator: AcceleratorHealth,
    /// Entries held by the in-process tier.
    pub memory_entries: u64,
    /// Durable document file, `None` when storage is disabled.
    pub durable_path: Option<PathBuf>,
}

/// Redis tier state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorHealth {
    /// A URL was configured.
    pub configured: bool,
    /// The last `PING` succeeded.
    pub available: bool,
    /// Round-trip time of that `PING`.
    #[serde(with = "humantime_serde")]
    pub latency: Option<Duration>,
}
