//! rsocket-trace - Call-level tracing for rsocket applications
//!
//! Preload this library ahead of `librdmacm` to log every `rrecv`, `rsend`
//! and `rpoll` call to `stderr` without touching the application:
//!
//! ```text
//! LD_PRELOAD=path/to/librsocket_trace.so ./my_rsocket_app
//! ```
//!
//! Each call is forwarded to the original function unchanged; the trace
//! records arguments, the result, `errno` on failure and, for `rpoll`, the
//! requested and returned events of every descriptor.
//!
//! The interposer can also be built and driven from Rust:
//!
//! ```rust
//! use rsocket_trace::CaptureSink;
//!
//! let sink = CaptureSink::new();
//! let interposer = rsocket_trace::new()
//!     .sink(sink.clone())
//!     .build()
//!     .unwrap();
//!
//! // Without librdmacm loaded the original cannot be found.
//! assert!(interposer.poll_slice(&mut [], 0).is_err());
//! assert_eq!(sink.lines().len(), 1);
//! ```

pub mod events;
pub mod ffi;
pub mod interposer;
pub mod trace;
pub mod util;

pub use events::{FormattedEvents, POLL_EVENTS, PollEvent, format_events, render_events};
pub use interposer::{Interposer, InterposerBuilder, InterposerConfig, InterposerError, ResolvedSymbols, SocketOps, Symbol};
pub use trace::{CaptureSink, StderrSink, TraceSink};

/// Create a new interposer builder
#[must_use]
pub fn new() -> InterposerBuilder {
	InterposerBuilder::new()
}

/// Build an interposer with default settings and make it the process-wide
/// instance used by the exported symbols
///
/// This is equivalent to `interposer::install(new().build()?)`
pub fn init() -> Result<&'static Interposer, InterposerError> {
	interposer::install(new().build()?)
}
