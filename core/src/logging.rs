//! Logging initialization
//!
//! Installs a `tracing-subscriber` fmt subscriber writing to stderr. The
//! filter comes from `RUST_LOG` when set, else from configuration.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber; later calls do nothing
pub fn init(default_filter: &str) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        // Another subscriber may already be installed (tests, embedding hosts)
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
