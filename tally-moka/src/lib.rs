#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
pub mod metrics;
mod store;

pub use builder::{DEFAULT_MAX_ENTRIES, MemoryStoreBuilder};
pub use moka::policy::EvictionPolicy;
pub use store::MemoryStore;
