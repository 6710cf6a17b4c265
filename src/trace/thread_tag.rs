//! Thread identification for trace lines

use std::ffi::CStr;
use std::path::Path;

/// Longest tag rendered in a trace line, in bytes
pub const TAG_LEN: usize = 16;

/// Pick the tag for a thread.
///
/// The thread's name is used when it is set and differs from the program's
/// own short name. Otherwise the low 32 bits of `handle` are rendered as at
/// least four upper-case hex digits.
#[must_use]
pub fn derive_tag(name: Option<&str>, program: &str, handle: u64) -> String {
	match name {
		Some(name) if !name.is_empty() && name != program => name.to_owned(),
		_ => format!("{:04X}", handle as u32),
	}
}

/// Tag for the calling thread
#[must_use]
pub fn current_thread_tag(program: &str) -> String {
	let mut buf = [0 as libc::c_char; TAG_LEN];
	// SAFETY: pthread_self has no preconditions.
	let handle = unsafe { libc::pthread_self() };
	// SAFETY: the buffer is TAG_LEN bytes, which is what is passed as its length.
	let ret = unsafe { libc::pthread_getname_np(handle, buf.as_mut_ptr(), buf.len()) };

	// SAFETY: on success pthread_getname_np leaves a NUL-terminated name in `buf`.
	let name = (ret == 0).then(|| unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy());
	derive_tag(name.as_deref(), program, handle as u64)
}

/// Short name of the running program, i.e. the last component of `argv[0]`
#[must_use]
pub fn program_short_name() -> String {
	std::env::args_os()
		.next()
		.and_then(|arg0| Path::new(&arg0).file_name().map(|name| name.to_string_lossy().into_owned()))
		.unwrap_or_default()
}
