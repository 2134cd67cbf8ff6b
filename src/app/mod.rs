//! Main application modules.
//!
//! This module provides the console rendering of diagnostic progress and the
//! statistics printed at the end of a run.

pub mod console;
pub mod statistics;

// Re-export public API
pub use console::ConsoleSink;
pub use statistics::{print_probe_statistics, print_simple_summary};
