//! Error handling and probe statistics.
//!
//! This module provides:
//! - Error type definitions for every subsystem
//! - Probe outcome statistics tracking
//!
//! Probe outcomes are categorized into:
//! - **Success**: split into "good" and "degraded" by the prober's threshold
//! - **Timeout**: the probe's deadline fired first
//! - **Construction / network errors**: isolated per region, never abort a run

mod stats;
mod types;

// Re-export public API
pub use stats::ProbeStats;
pub use types::{
    ApiError, InitializationError, NegotiationError, OutcomeType, RegistryError, SessionError,
    SpeedTestError, StunError,
};
