//! Poll event formatting
//!
//! Translates a `poll(2)` event bitmask into a pipe-delimited list of flag
//! names, e.g. `POLLIN|POLLOUT`.

use libc::c_short;

/// A recognized readiness flag and the name it is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollEvent {
	/// Bit value of the flag
	pub bit: c_short,
	/// Display name of the flag
	pub name: &'static str,
}

/// Recognized flags in rendering order.
pub const POLL_EVENTS: [PollEvent; 9] = [
	PollEvent { bit: libc::POLLHUP, name: "POLLHUP" },
	PollEvent { bit: libc::POLLERR, name: "POLLERR" },
	PollEvent { bit: libc::POLLNVAL, name: "POLLNVAL" },
	PollEvent { bit: libc::POLLIN, name: "POLLIN" },
	PollEvent { bit: libc::POLLPRI, name: "POLLPRI" },
	PollEvent { bit: libc::POLLOUT, name: "POLLOUT" },
	PollEvent { bit: libc::POLLRDHUP, name: "POLLRDHUP" },
	PollEvent { bit: libc::POLLRDBAND, name: "POLLRDBAND" },
	PollEvent { bit: libc::POLLWRBAND, name: "POLLWRBAND" },
];

const DELIMITER: u8 = b'|';

/// Outcome of [`format_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormattedEvents {
	/// Length of the rendered string, excluding the NUL terminator
	pub len: usize,
	/// Whether some flag names did not fit in the buffer
	pub truncated: bool,
}

impl FormattedEvents {
	/// View the rendered bytes of `buf` as a string.
	///
	/// `buf` must be the buffer that was passed to [`format_events`].
	#[must_use]
	pub fn as_str<'a>(&self, buf: &'a [u8]) -> &'a str {
		// Flag names are ASCII, so any prefix is valid UTF-8.
		std::str::from_utf8(&buf[..self.len]).unwrap_or_default()
	}
}

/// Render the names of the flags set in `mask` into `buf`.
///
/// The output is NUL-terminated and never exceeds `buf.len()` bytes including
/// the terminator. Names are written in [`POLL_EVENTS`] order separated by
/// `|`; unrecognized bits are ignored. When the buffer fills up, formatting
/// stops with a partial name and `truncated` is set. A trailing delimiter is
/// trimmed.
pub fn format_events(mask: i32, buf: &mut [u8]) -> FormattedEvents {
	let mut out = FormattedEvents::default();
	let Some(limit) = buf.len().checked_sub(1) else {
		out.truncated = POLL_EVENTS.iter().any(|ev| mask & i32::from(ev.bit) != 0);
		return out;
	};

	'flags: for ev in POLL_EVENTS.iter().filter(|ev| mask & i32::from(ev.bit) != 0) {
		let delimiter = if out.len > 0 { Some(&DELIMITER) } else { None };
		for &byte in delimiter.into_iter().chain(ev.name.as_bytes()) {
			if out.len == limit {
				out.truncated = true;
				break 'flags;
			}
			buf[out.len] = byte;
			out.len += 1;
		}
	}

	if out.len > 0 && buf[out.len - 1] == DELIMITER {
		out.len -= 1;
	}
	buf[out.len] = 0;
	out
}

/// Render `mask` into an owned string using a buffer of `capacity` bytes.
#[must_use]
pub fn render_events(mask: i32, capacity: usize) -> String {
	let mut buf = vec![0u8; capacity];
	let formatted = format_events(mask, &mut buf);
	formatted.as_str(&buf).to_owned()
}
