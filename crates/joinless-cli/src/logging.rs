//! Tracing setup for the CLI.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber once.
///
/// Levels come from `JOINLESS_LOG` (e.g. `JOINLESS_LOG=joinless_core=debug`),
/// falling back to `joinless=info` when unset or unparsable. Logs go to
/// stderr so `--json` output on stdout stays clean.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("JOINLESS_LOG")
            .unwrap_or_else(|_| EnvFilter::new("joinless=info"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
