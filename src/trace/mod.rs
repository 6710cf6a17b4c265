//! Trace line rendering
//!
//! Every trace line has the layout
//!
//! ```text
//! Mar 04 13:37:01 000042 [worker-1]: rrecv rsocket 5 len 100 buf 0x7ffd5e4c ret 42
//! ```
//!
//! i.e. a local timestamp, a tag identifying the calling thread, and the
//! message. Lines are handed to a [`TraceSink`] in one piece.

mod sink;
mod thread_tag;
mod timestamp;

pub use sink::{CaptureSink, StderrSink, TraceSink};
pub use thread_tag::{TAG_LEN, current_thread_tag, derive_tag, program_short_name};
pub use timestamp::Timestamp;

use std::fmt::{self, Write};

/// Emit a trace line through a [`TraceLogger`] with `format!`-style arguments.
macro_rules! trace_line {
	($logger:expr, $($arg:tt)+) => {
		$logger.emit(format_args!($($arg)+))
	};
}

pub(crate) use trace_line;

/// Renders and emits trace lines
pub struct TraceLogger {
	sink: Box<dyn TraceSink>,
	program: String,
}

impl fmt::Debug for TraceLogger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TraceLogger")
			.field("sink", &self.sink.name())
			.field("program", &self.program)
			.finish()
	}
}

impl TraceLogger {
	/// Create a logger writing to `sink`
	///
	/// `program` is the short name that thread names are compared against.
	#[must_use]
	pub fn new(sink: Box<dyn TraceSink>, program: impl Into<String>) -> Self {
		Self {
			sink,
			program: program.into(),
		}
	}

	/// Emit one line with the current time and thread tag
	pub fn emit(&self, message: fmt::Arguments<'_>) {
		let tag = current_thread_tag(&self.program);
		self.sink.write_line(&render_line(Timestamp::now(), &tag, message));
	}
}

/// Build a complete line, newline included
#[must_use]
pub fn render_line(timestamp: Timestamp, tag: &str, message: fmt::Arguments<'_>) -> String {
	let mut line = String::with_capacity(128);
	let _ = write!(line, "{timestamp} [{}]: {message}", clip(tag, TAG_LEN));
	line.push('\n');
	line
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character
pub(crate) fn clip(s: &str, max: usize) -> &str {
	if s.len() <= max {
		return s;
	}
	let mut end = max;
	while !s.is_char_boundary(end) {
		end -= 1;
	}
	&s[..end]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn line_layout() {
		let ts = Timestamp { secs: 0, micros: 7 };
		let line = render_line(ts, "1A2B", format_args!("rpoll ret {} ", 1));
		assert!(line.ends_with(" 000007 [1A2B]: rpoll ret 1 \n"), "{line}");
	}

	#[test]
	fn long_tags_are_clipped() {
		let ts = Timestamp { secs: 0, micros: 0 };
		let line = render_line(ts, "abcdefghijklmnopqrstuvwxyz", format_args!("x"));
		assert!(line.contains("[abcdefghijklmnop]: x"), "{line}");
	}

	#[test]
	fn clip_respects_char_boundaries() {
		assert_eq!(clip("héllo", 2), "h");
		assert_eq!(clip("héllo", 3), "hé");
		assert_eq!(clip("short", 16), "short");
	}

	#[test]
	fn logger_writes_one_line_per_call() {
		let sink = CaptureSink::new();
		let logger = TraceLogger::new(Box::new(sink.clone()), "prog");
		trace_line!(logger, "rsend rsocket {} len {}", 3, 9);
		trace_line!(logger, "second");

		let lines = sink.lines();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].ends_with("]: rsend rsocket 3 len 9\n"));
		assert!(lines[1].ends_with("]: second\n"));
	}
}
