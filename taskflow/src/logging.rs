//! Diagnostic tracing for the scheduler and CLI.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Diagnostics via `RUST_LOG`, output to stderr.
//!   Not persisted, not part of the product output.
//!
//! - **Run log (`plan::RunLogEntry`)**: Product artifact written under the
//!   runs directory. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, or `info` for
/// the `taskflow` target when `verbose` is true.
///
/// # Example
/// ```bash
/// RUST_LOG=taskflow=debug taskflow run "Add dark mode"
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,taskflow=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .init();
}
