//! Telemetry initialization.
//!
//! No network access, no daemon mode (Non-goals) — so there is nothing to
//! ship spans to. `init` wires a plain `EnvFilter`-driven subscriber to
//! stderr; set `RUST_LOG` to control verbosity (`RUST_LOG=debug vin-reorg
//! ...`).

use tracing_subscriber::EnvFilter;

/// Initialize the stderr tracing subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
