//! Interposer functionality
//!
//! This module contains the wrappers around `rrecv`, `rsend` and `rpoll`.
//! Each wrapper forwards the call unchanged, traces what happened, and
//! returns the original result with `errno` as the original left it.

mod builder;
mod error;
mod ops;

pub use builder::{InterposerBuilder, InterposerConfig};
pub use error::{InterposerError, Result};
pub use ops::{PollFn, RecvFn, ResolvedSymbols, SendFn, SocketOps, Symbol};

use std::ffi::{CStr, c_void};
use std::fmt::Write;

use libc::{c_int, nfds_t, pollfd, size_t, ssize_t};
use nix::errno::Errno;
use once_cell::sync::OnceCell;

use crate::events::render_events;
use crate::trace::{TraceLogger, trace_line};

// The process-wide interposer used by the exported symbols
static ACTIVE_INTERPOSER: OnceCell<Interposer> = OnceCell::new();

/// Main interposer struct
///
/// Created with [`InterposerBuilder`]. All state is fixed at construction,
/// so a single instance can serve any number of threads without locking.
#[derive(Debug)]
pub struct Interposer {
	config: InterposerConfig,
	ops: Box<dyn SocketOps>,
	logger: TraceLogger,
}

impl std::fmt::Debug for dyn SocketOps {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl Interposer {
	pub(crate) fn new(config: InterposerConfig, ops: Box<dyn SocketOps>, logger: TraceLogger) -> Self {
		Self { config, ops, logger }
	}

	/// Get the configuration
	#[must_use]
	pub const fn config(&self) -> &InterposerConfig {
		&self.config
	}

	/// Symbols whose original implementation is unavailable
	#[must_use]
	pub fn missing_symbols(&self) -> Vec<Symbol> {
		self.ops.missing()
	}

	/// Forward to the original `rrecv` and trace the result
	///
	/// # Safety
	///
	/// `buf` must be valid for writes of `len` bytes.
	pub unsafe fn recv(&self, socket: c_int, buf: *mut c_void, len: size_t, flags: c_int) -> Result<ssize_t> {
		let ret = unsafe { self.ops.recv(socket, buf, len, flags) }?;
		let errno = Errno::last_raw();
		self.trace_transfer(Symbol::Recv, socket, len, buf.cast_const(), ret, errno);
		Errno::set_raw(errno);
		Ok(ret)
	}

	/// Forward to the original `rsend` and trace the result
	///
	/// # Safety
	///
	/// `buf` must be valid for reads of `len` bytes.
	pub unsafe fn send(&self, socket: c_int, buf: *const c_void, len: size_t, flags: c_int) -> Result<ssize_t> {
		let ret = unsafe { self.ops.send(socket, buf, len, flags) }?;
		let errno = Errno::last_raw();
		self.trace_transfer(Symbol::Send, socket, len, buf, ret, errno);
		Errno::set_raw(errno);
		Ok(ret)
	}

	/// Forward to the original `rpoll`, tracing the requested events before
	/// the call and the returned events after it
	///
	/// # Safety
	///
	/// `fds` must point to `nfds` valid, writable `pollfd` entries, or be
	/// null when `nfds` is zero.
	pub unsafe fn poll(&self, fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> Result<c_int> {
		if self.config.log_pre_poll {
			let mut line = format!("{} n {} ", Symbol::Poll, nfds);
			for fd in unsafe { descriptors(fds, nfds) }.iter().filter(|fd| fd.fd > 0) {
				self.push_events(&mut line, fd.fd, fd.events);
			}
			trace_line!(self.logger, "{line}");
		}

		let ret = unsafe { self.ops.poll(fds, nfds, timeout) }?;
		let errno = Errno::last_raw();

		let mut line = format!("{} ret {} ", Symbol::Poll, ret);
		for fd in unsafe { descriptors(fds, nfds) }
			.iter()
			.filter(|fd| fd.fd > 0 && fd.revents != 0)
		{
			self.push_events(&mut line, fd.fd, fd.revents);
		}
		trace_line!(self.logger, "{line}");

		Errno::set_raw(errno);
		Ok(ret)
	}

	/// Safe form of [`Interposer::poll`] for descriptors owned by the caller
	pub fn poll_slice(&self, fds: &mut [pollfd], timeout: c_int) -> Result<c_int> {
		// SAFETY: the slice provides exactly `len` writable entries.
		unsafe { self.poll(fds.as_mut_ptr(), fds.len() as nfds_t, timeout) }
	}

	fn trace_transfer(&self, symbol: Symbol, socket: c_int, len: size_t, buf: *const c_void, ret: ssize_t, errno: c_int) {
		if ret >= 0 {
			trace_line!(self.logger, "{symbol} rsocket {socket} len {len} buf {buf:p} ret {ret}");
		} else {
			let descr = describe_errno(errno, self.config.error_buffer_len);
			trace_line!(self.logger, "{symbol} rsocket {socket} len {len} buf {buf:p} ret {ret} errno {errno} ({descr})");
		}
	}

	fn push_events(&self, line: &mut String, fd: c_int, events: libc::c_short) {
		let flags = render_events(i32::from(events), self.config.event_buffer_len);
		let _ = write!(line, "{fd} ({flags}) ");
	}
}

unsafe fn descriptors<'a>(fds: *const pollfd, nfds: nfds_t) -> &'a [pollfd] {
	if fds.is_null() || nfds == 0 {
		&[]
	} else {
		// SAFETY: the caller guarantees `fds` points to `nfds` entries.
		unsafe { std::slice::from_raw_parts(fds, nfds as usize) }
	}
}

/// The platform's description of an `errno` value, as `strerror_r` renders
/// it into a buffer of `capacity` bytes
///
/// Descriptions that do not fit are cut short; the terminator is always
/// inside the buffer.
#[must_use]
pub fn describe_errno(errno: c_int, capacity: usize) -> String {
	let mut buf = vec![0 as libc::c_char; capacity.max(1)];
	// SAFETY: strerror_r writes at most `buf.len()` bytes into `buf`.
	unsafe { libc::strerror_r(errno, buf.as_mut_ptr(), buf.len()) };
	let last = buf.len() - 1;
	buf[last] = 0;
	// SAFETY: the buffer is NUL-terminated at `last` or earlier.
	unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy().into_owned()
}

/// Make `interposer` the process-wide instance used by the exported symbols
pub fn install(interposer: Interposer) -> Result<&'static Interposer> {
	ACTIVE_INTERPOSER
		.set(interposer)
		.map_err(|_| InterposerError::AlreadyInitialized)?;
	active()
}

/// Get the process-wide interposer
pub fn active() -> Result<&'static Interposer> {
	ACTIVE_INTERPOSER.get().ok_or(InterposerError::NotInitialized)
}
