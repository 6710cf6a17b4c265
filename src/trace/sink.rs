//! Output sinks for trace lines

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for rendered trace lines
///
/// A sink receives one complete line per call, including the trailing
/// newline. Sinks must never report failures back to the caller.
pub trait TraceSink: Send + Sync {
	/// Write a single line
	fn write_line(&self, line: &str);

	/// Get the name of the sink
	///
	/// This is used for debugging and logging purposes.
	fn name(&self) -> &'static str {
		std::any::type_name::<Self>()
	}
}

/// Sink that writes each line to `stderr` with a single locked write
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl StderrSink {
	/// Create a new `StderrSink`
	#[must_use]
	pub const fn new() -> Self {
		Self
	}
}

impl TraceSink for StderrSink {
	fn write_line(&self, line: &str) {
		let mut stderr = std::io::stderr().lock();
		let _ = stderr.write_all(line.as_bytes());
	}

	fn name(&self) -> &'static str {
		"StderrSink"
	}
}

/// Sink that keeps lines in memory
///
/// Clones share the same buffer, so one handle can be given to an
/// interposer while another is used to read the lines back.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
	lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
	/// Create a new, empty `CaptureSink`
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Get a copy of every line captured so far
	#[must_use]
	pub fn lines(&self) -> Vec<String> {
		self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
	}

	/// Discard all captured lines
	pub fn clear(&self) {
		if let Ok(mut lines) = self.lines.lock() {
			lines.clear();
		}
	}
}

impl TraceSink for CaptureSink {
	fn write_line(&self, line: &str) {
		if let Ok(mut lines) = self.lines.lock() {
			lines.push(line.to_owned());
		}
	}

	fn name(&self) -> &'static str {
		"CaptureSink"
	}
}
