use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that turns on log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `{app_name}=info,fanin=info` when `RUST_LOG` is not set. Panics if a global
/// subscriber is already installed.
pub fn init_tracing(app_name: &str) {
    let default_filter = format!("{}=info,fanin=info", app_name.replace('-', "_"));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fanin=trace"));

        // Another harness may have installed a subscriber already; keep theirs.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
