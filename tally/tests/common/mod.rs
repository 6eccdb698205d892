#![allow(dead_code)]

use std::sync::{Arc, Once};

use tally::{Tally, TallyConfig};
use tally_core::ManualClock;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Configuration storing the document under `dir`.
pub fn config_in(dir: &TempDir) -> TallyConfig {
    let mut config = TallyConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config
}

pub async fn open_with(config: TallyConfig, clock: &ManualClock) -> Tally {
    init_tracing();
    Tally::builder(config)
        .clock(Arc::new(clock.clone()))
        .open()
        .await
        .expect("open tally")
}

/// A store in `dir` driven by `clock`.
pub async fn open_in(dir: &TempDir, clock: &ManualClock) -> Tally {
    open_with(config_in(dir), clock).await
}
