#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod retry;
pub mod store;

#[doc(inline)]
pub use crate::error::Error;
#[doc(inline)]
pub use crate::retry::RetryPolicy;
#[doc(inline)]
pub use crate::store::{AcceleratorStore, AcceleratorStoreBuilder};
