//! Structured logging setup.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the application's call. [`init_tracing`] is the default one.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a formatting subscriber as the global default.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g. the
/// configured `log_level`) is used. Returns `false` if a global subscriber
/// was already installed, which makes repeated calls harmless.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
