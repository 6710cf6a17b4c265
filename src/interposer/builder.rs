//! Builder for creating interposers
//!
//! This module contains the `InterposerBuilder` struct and related
//! functionality for configuring and building interposers.

use crate::interposer::ops::{ResolvedSymbols, SocketOps};
use crate::interposer::{Interposer, InterposerError, Result};
use crate::trace::{StderrSink, TraceLogger, TraceSink, program_short_name};

/// Configuration for an interposer
#[derive(Debug, Clone)]
pub struct InterposerConfig {
	/// Capacity of the buffer a poll event mask is rendered into
	pub event_buffer_len: usize,
	/// Capacity of the buffer an error description is copied into
	pub error_buffer_len: usize,
	/// Whether to trace the descriptors handed to `rpoll` before the call
	pub log_pre_poll: bool,
}

impl Default for InterposerConfig {
	fn default() -> Self {
		Self {
			event_buffer_len: 128,
			error_buffer_len: 256,
			log_pre_poll: true,
		}
	}
}

/// Builder for creating interposers
///
/// Anything left unset falls back to the preload defaults: originals
/// resolved with `dlsym(RTLD_NEXT, ..)`, lines written to `stderr`, and
/// thread names compared against the program's short name.
#[derive(Default)]
pub struct InterposerBuilder {
	config: InterposerConfig,
	ops: Option<Box<dyn SocketOps>>,
	sink: Option<Box<dyn TraceSink>>,
	program_name: Option<String>,
}

impl std::fmt::Debug for InterposerBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InterposerBuilder")
			.field("config", &self.config)
			.field("ops", &self.ops.as_ref().map_or("ResolvedSymbols (default)", |ops| ops.name()))
			.field("sink", &self.sink.as_ref().map_or("StderrSink (default)", |sink| sink.name()))
			.field("program_name", &self.program_name)
			.finish()
	}
}

impl InterposerBuilder {
	/// Create a new interposer builder with default settings
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the whole configuration
	#[must_use]
	pub fn config(mut self, config: InterposerConfig) -> Self {
		self.config = config;
		self
	}

	/// Set the capacity used to render poll event masks
	#[must_use]
	pub const fn event_buffer_len(mut self, len: usize) -> Self {
		self.config.event_buffer_len = len;
		self
	}

	/// Set the maximum size of an error description
	#[must_use]
	pub const fn error_buffer_len(mut self, len: usize) -> Self {
		self.config.error_buffer_len = len;
		self
	}

	/// Enable or disable the pre-call `rpoll` line
	#[must_use]
	pub const fn log_pre_poll(mut self, enabled: bool) -> Self {
		self.config.log_pre_poll = enabled;
		self
	}

	/// Set the implementation calls are forwarded to
	#[must_use]
	pub fn ops<O: SocketOps + 'static>(mut self, ops: O) -> Self {
		self.ops = Some(Box::new(ops));
		self
	}

	/// Set where trace lines are written
	#[must_use]
	pub fn sink<S: TraceSink + 'static>(mut self, sink: S) -> Self {
		self.sink = Some(Box::new(sink));
		self
	}

	/// Set the program name that thread names are compared against
	#[must_use]
	pub fn program_name(mut self, name: impl Into<String>) -> Self {
		self.program_name = Some(name.into());
		self
	}

	/// Build the interposer
	pub fn build(self) -> Result<Interposer> {
		if self.config.event_buffer_len == 0 {
			return Err(InterposerError::InvalidConfig("event_buffer_len must be at least 1".into()));
		}
		if self.config.error_buffer_len == 0 {
			return Err(InterposerError::InvalidConfig("error_buffer_len must be at least 1".into()));
		}

		let ops = self.ops.unwrap_or_else(|| Box::new(ResolvedSymbols::resolve()));
		let sink = self.sink.unwrap_or_else(|| Box::new(StderrSink::new()));
		let program = self.program_name.unwrap_or_else(program_short_name);

		Ok(Interposer::new(self.config, ops, TraceLogger::new(sink, program)))
	}
}
