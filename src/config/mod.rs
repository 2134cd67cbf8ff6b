//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (deadlines, thresholds, fixture paths)
//! - The library `Config` struct
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{AggregationPolicy, Command, Config, LogFormat, LogLevel, Opt};
