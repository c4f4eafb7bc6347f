//! Diagnostic logging setup.
//!
//! The hook only ever emits `tracing` events; whoever owns the process
//! decides where they go. This installs the same fmt subscriber the rest of
//! the workspace expects.

use tracing_subscriber::EnvFilter;

use crate::config::MountGateConfig;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `fallback` is used as the filter
/// directive. Returns `false` if a global subscriber was already installed.
pub fn init_logging(fallback: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Installs a global fmt subscriber filtered by `config.log_filter`
/// unless `RUST_LOG` is set. Returns `false` if one was already installed.
pub fn init_from_config(config: &MountGateConfig) -> bool {
    init_logging(&config.log_filter)
}

/// Installs a subscriber that writes through the test harness's captured
/// output. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
