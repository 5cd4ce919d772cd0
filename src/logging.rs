//! Logging bootstrap
//!
//! Optional helpers for hosts and examples that do not configure their own
//! `tracing` subscriber. Library code only emits through the `tracing`
//! macros and never installs a subscriber on its own.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted subscriber honoring `RUST_LOG`
///
/// Falls back to `info` when `RUST_LOG` is unset. Safe to call once per
/// process; subsequent calls are ignored.
pub fn init() {
    init_with_filter("info");
}

/// Install a formatted subscriber with an explicit default filter
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
