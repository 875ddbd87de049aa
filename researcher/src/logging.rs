//! Tracing setup for the `researcher` binary.
//!
//! Log lines go to stderr and are filtered by `RUST_LOG`. Reports, iteration
//! records, the missing-action log, and the batch summary are written as files
//! regardless of the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info` so batch progress is visible.
///
/// # Example
/// ```bash
/// RUST_LOG=researcher=debug researcher run --subjects leads.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
