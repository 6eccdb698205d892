//! Tier names.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Name of a storage tier, as reported by `Store::label()`.
///
/// A fallback chain reports it in every `Served` answer and joins it with
/// its own name for metrics:
///
/// ```
/// use tally_core::StoreLabel;
///
/// let chain = StoreLabel::from("tally");
/// assert_eq!(chain.compose(&StoreLabel::from("durable")).as_str(), "tally.durable");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreLabel(SmolStr);

impl StoreLabel {
    /// Label from a static name, without allocating.
    pub const fn new_static(name: &'static str) -> Self {
        Self(SmolStr::new_static(name))
    }

    /// The name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `"{self}.{tier}"`.
    pub fn compose(&self, tier: &StoreLabel) -> Self {
        Self(smol_str::format_smolstr!("{}.{}", self.0, tier.0))
    }
}

impl fmt::Display for StoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreLabel {
    fn from(name: &str) -> Self {
        Self(SmolStr::new(name))
    }
}
