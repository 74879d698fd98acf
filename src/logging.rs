//! Logging bootstrap
//!
//! Diagnostics go to stderr so stdout carries nothing but command output.
//! `RUST_LOG` wins when set; otherwise `verbose` picks `debug` over `warn`.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install the global subscriber; later calls are no-ops
pub fn init(verbose: bool) {
    INITIALIZED.get_or_init(|| {
        let default_level = if verbose { "debug" } else { "warn" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}
