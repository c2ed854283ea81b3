//! Logging initialization
//!
//! Thin wrapper over tracing-subscriber so binaries and integration tests
//! initialize logging the same way. The filter defaults can be overridden
//! via `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env-filter.
///
/// `default_filter` is used when `RUST_LOG` is not set, e.g.
/// `"jbx_player=debug,jbx_common=info"`.
pub fn init(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize tracing for tests, ignoring double-init errors.
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("debug"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
