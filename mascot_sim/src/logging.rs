// mascot_sim/src/logging.rs

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when neither `--log-level` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "info,mascot_core=info,mascot_sim=debug";

/// Installs the global `tracing` subscriber.
///
/// An explicit `filter` (e.g. `"mascot_core=debug"`) wins, then `RUST_LOG`,
/// then [`DEFAULT_FILTER`]. Calling this twice is harmless; the second call is
/// ignored.
pub fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(custom) => EnvFilter::try_new(custom).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
