//! Access to the original rsocket functions
//!
//! [`SocketOps`] is the seam between the interposer and the functions it
//! wraps. [`ResolvedSymbols`] is the production implementation: it looks up
//! the next definition of each symbol in the dynamic linker's search order,
//! which is the real `librdmacm` when this library is preloaded.

use std::ffi::{CStr, c_void};
use std::fmt;

use libc::{c_int, nfds_t, pollfd, size_t, ssize_t};

use crate::interposer::{InterposerError, Result};

/// Signature of `rrecv`
pub type RecvFn = unsafe extern "C" fn(c_int, *mut c_void, size_t, c_int) -> ssize_t;
/// Signature of `rsend`
pub type SendFn = unsafe extern "C" fn(c_int, *const c_void, size_t, c_int) -> ssize_t;
/// Signature of `rpoll`
pub type PollFn = unsafe extern "C" fn(*mut pollfd, nfds_t, c_int) -> c_int;

/// The intercepted rsocket functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
	/// `rrecv`
	Recv,
	/// `rsend`
	Send,
	/// `rpoll`
	Poll,
}

impl Symbol {
	/// All intercepted symbols
	pub const ALL: [Self; 3] = [Self::Recv, Self::Send, Self::Poll];

	/// The exported name of the symbol
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Recv => "rrecv",
			Self::Send => "rsend",
			Self::Poll => "rpoll",
		}
	}

	const fn c_name(self) -> &'static CStr {
		match self {
			Self::Recv => c"rrecv",
			Self::Send => c"rsend",
			Self::Poll => c"rpoll",
		}
	}

	const fn unresolved(self) -> InterposerError {
		InterposerError::ResolutionFailed { symbol: self.name() }
	}
}

impl fmt::Display for Symbol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Trait for calling the original rsocket functions
///
/// Implementations must leave `errno` exactly as the underlying call set it.
pub trait SocketOps: Send + Sync {
	/// Call the original `rrecv`
	///
	/// # Safety
	///
	/// The arguments must satisfy the contract of `rrecv`: `buf` must be
	/// valid for writes of `len` bytes.
	unsafe fn recv(&self, socket: c_int, buf: *mut c_void, len: size_t, flags: c_int) -> Result<ssize_t>;

	/// Call the original `rsend`
	///
	/// # Safety
	///
	/// The arguments must satisfy the contract of `rsend`: `buf` must be
	/// valid for reads of `len` bytes.
	unsafe fn send(&self, socket: c_int, buf: *const c_void, len: size_t, flags: c_int) -> Result<ssize_t>;

	/// Call the original `rpoll`
	///
	/// # Safety
	///
	/// `fds` must point to `nfds` valid, writable `pollfd` entries.
	unsafe fn poll(&self, fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> Result<c_int>;

	/// Symbols this implementation cannot serve
	fn missing(&self) -> Vec<Symbol> {
		Vec::new()
	}

	/// Get the name of the implementation
	///
	/// This is used for debugging and logging purposes.
	fn name(&self) -> &'static str {
		std::any::type_name::<Self>()
	}
}

/// Original rsocket functions, looked up once and never changed afterwards
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedSymbols {
	recv: Option<RecvFn>,
	send: Option<SendFn>,
	poll: Option<PollFn>,
}

impl ResolvedSymbols {
	/// Look up every symbol with `dlsym(RTLD_NEXT, ..)`
	#[must_use]
	pub fn resolve() -> Self {
		// SAFETY: each symbol, when present, has the C signature it is cast to.
		unsafe {
			Self {
				recv: lookup(Symbol::Recv).map(|ptr| std::mem::transmute::<*mut c_void, RecvFn>(ptr)),
				send: lookup(Symbol::Send).map(|ptr| std::mem::transmute::<*mut c_void, SendFn>(ptr)),
				poll: lookup(Symbol::Poll).map(|ptr| std::mem::transmute::<*mut c_void, PollFn>(ptr)),
			}
		}
	}

	/// Build a table from known function pointers
	#[must_use]
	pub const fn from_fns(recv: Option<RecvFn>, send: Option<SendFn>, poll: Option<PollFn>) -> Self {
		Self { recv, send, poll }
	}

	/// Check whether a symbol was found
	#[must_use]
	pub const fn is_resolved(&self, symbol: Symbol) -> bool {
		match symbol {
			Symbol::Recv => self.recv.is_some(),
			Symbol::Send => self.send.is_some(),
			Symbol::Poll => self.poll.is_some(),
		}
	}
}

fn lookup(symbol: Symbol) -> Option<*mut c_void> {
	// SAFETY: RTLD_NEXT is a valid pseudo-handle and the name is NUL-terminated.
	let ptr = unsafe { libc::dlsym(libc::RTLD_NEXT, symbol.c_name().as_ptr()) };
	if ptr.is_null() {
		tracing::debug!("dlsym(RTLD_NEXT, {}) returned NULL", symbol);
		None
	} else {
		tracing::debug!("Resolved {} at {:p}", symbol, ptr);
		Some(ptr)
	}
}

impl SocketOps for ResolvedSymbols {
	unsafe fn recv(&self, socket: c_int, buf: *mut c_void, len: size_t, flags: c_int) -> Result<ssize_t> {
		let recv = self.recv.ok_or(Symbol::Recv.unresolved())?;
		Ok(unsafe { recv(socket, buf, len, flags) })
	}

	unsafe fn send(&self, socket: c_int, buf: *const c_void, len: size_t, flags: c_int) -> Result<ssize_t> {
		let send = self.send.ok_or(Symbol::Send.unresolved())?;
		Ok(unsafe { send(socket, buf, len, flags) })
	}

	unsafe fn poll(&self, fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> Result<c_int> {
		let poll = self.poll.ok_or(Symbol::Poll.unresolved())?;
		Ok(unsafe { poll(fds, nfds, timeout) })
	}

	fn missing(&self) -> Vec<Symbol> {
		Symbol::ALL.into_iter().filter(|&symbol| !self.is_resolved(symbol)).collect()
	}

	fn name(&self) -> &'static str {
		"ResolvedSymbols"
	}
}
