//! Utility modules for rsocket-trace
//!
//! This module contains utility functions used by the interposer.

pub mod logging;

pub use logging::init_logging;
