//! Error types for the interposer
//!
//! This module contains error types and a result type for the interposer.
//! Failures reported by the original rsocket functions are not errors here:
//! they are traced and handed back to the caller untouched.

use thiserror::Error;

/// Result type for interposer operations
pub type Result<T> = std::result::Result<T, InterposerError>;

/// Error type for interposer operations
#[derive(Debug, Error)]
pub enum InterposerError {
	/// The interposer is already initialized
	#[error("The interposer is already initialized")]
	AlreadyInitialized,

	/// The interposer is not initialized
	#[error("The interposer is not initialized")]
	NotInitialized,

	/// The original implementation of a symbol could not be found
	#[error("Failed to resolve original symbol `{symbol}`")]
	ResolutionFailed {
		/// Name of the missing symbol
		symbol: &'static str,
	},

	/// The configuration cannot be used
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

impl InterposerError {
	/// The `errno` value reported to C callers for this error
	#[must_use]
	pub const fn errno(&self) -> libc::c_int {
		match self {
			Self::ResolutionFailed { .. } | Self::NotInitialized => libc::ENOSYS,
			Self::AlreadyInitialized | Self::InvalidConfig(_) => libc::EINVAL,
		}
	}
}
