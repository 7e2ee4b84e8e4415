//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is not set.
///
/// Validation layer output (target `validation`) passes at every level: the
/// messenger only subscribes to what should be printed.
pub const DEFAULT_FILTER: &str = "info,validation=trace";

/// `RUST_LOG` if set, otherwise [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Output on stderr, so validation diagnostics land next to fatal errors
///
/// # Example
/// ```
/// trigon_core::init_logging();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
