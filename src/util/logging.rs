//! Diagnostics for the shim itself
//!
//! Trace lines for intercepted calls never go through here; this covers
//! start-up and failures of the interposer, reported through `tracing`.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Initialize logging once
static INIT: Once = Once::new();

/// Environment variable that raises the shim's diagnostics to `debug`
pub const DEBUG_ENV: &str = "RSOCKET_TRACE_DEBUG";

/// Initialize the tracing system
///
/// This function sets up tracing with an `EnvFilter` that:
/// - Honors the `RUST_LOG` environment variable if set
/// - Uses the `RSOCKET_TRACE_DEBUG` environment variable to control logging level
/// - Only logs warnings and errors by default
///
/// A subscriber already installed by the host process is left in place.
pub fn init_logging() {
	INIT.call_once(|| {
		let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(std::env::var_os(DEBUG_ENV).is_some()));

		let _ = tracing_subscriber::registry()
			.with(fmt::layer().with_target(true).with_writer(std::io::stderr))
			.with(filter)
			.try_init();
	});
}

fn default_filter(debug: bool) -> EnvFilter {
	if debug {
		EnvFilter::new("rsocket_trace=debug")
	} else {
		EnvFilter::new("rsocket_trace=warn")
	}
}
