//! C ABI surface of the preload library
//!
//! Exports `rrecv`, `rsend` and `rpoll` with the exact signatures of the
//! rsocket functions in `librdmacm`, plus the load-time hook that resolves
//! the originals and installs the process-wide interposer.

use std::ffi::c_void;

use libc::{c_int, nfds_t, pollfd, size_t, ssize_t};
use nix::errno::Errno;
use tracing::{debug, error, warn};

use crate::interposer::{self, InterposerError, Symbol};

/// Report an interposer failure to a C caller as `-1` with `errno` set
fn fail(symbol: Symbol, err: &InterposerError) -> c_int {
	error!("{} could not be forwarded: {}", symbol, err);
	Errno::set_raw(err.errno());
	-1
}

/// Traced replacement for `rrecv`
///
/// # Safety
///
/// Same contract as `rrecv`: `buf` must be valid for writes of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rrecv(socket: c_int, buf: *mut c_void, len: size_t, flags: c_int) -> ssize_t {
	interposer::active()
		.and_then(|active| unsafe { active.recv(socket, buf, len, flags) })
		.unwrap_or_else(|e| fail(Symbol::Recv, &e) as ssize_t)
}

/// Traced replacement for `rsend`
///
/// # Safety
///
/// Same contract as `rsend`: `buf` must be valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rsend(socket: c_int, buf: *const c_void, len: size_t, flags: c_int) -> ssize_t {
	interposer::active()
		.and_then(|active| unsafe { active.send(socket, buf, len, flags) })
		.unwrap_or_else(|e| fail(Symbol::Send, &e) as ssize_t)
}

/// Traced replacement for `rpoll`
///
/// # Safety
///
/// Same contract as `rpoll`: `fds` must point to `nfds` writable entries.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rpoll(fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> c_int {
	interposer::active()
		.and_then(|active| unsafe { active.poll(fds, nfds, timeout) })
		.unwrap_or_else(|e| fail(Symbol::Poll, &e))
}

/// Resolve the original rsocket functions and install the interposer
///
/// Runs from `.init_array` when the library is loaded. Loaders that call it
/// again get a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn init_rsocket_trace() {
	crate::util::init_logging();

	if interposer::active().is_ok() {
		return;
	}

	match crate::new().build().and_then(interposer::install) {
		Ok(active) => {
			for symbol in active.missing_symbols() {
				warn!("Original {} not found; calls to it will fail with ENOSYS", symbol);
			}
			debug!("Overloading rsocket");
		},
		Err(InterposerError::AlreadyInitialized) => {},
		Err(e) => error!("Failed to install rsocket interposer: {}", e),
	}
}

#[cfg(not(test))]
#[unsafe(link_section = ".init_array")]
#[used]
static CONSTRUCTOR: extern "C" fn() = init_rsocket_trace;
