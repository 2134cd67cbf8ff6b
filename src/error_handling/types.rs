//! Error type definitions.
//!
//! This module defines the error types used throughout the application and the
//! outcome categories counted by [`super::ProbeStats`].

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Errors building the endpoint registry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A region was declared with an empty id.
    #[error("Region id must not be empty")]
    EmptyRegionId,

    /// A region was declared without any relay host.
    #[error("Region {0} has no relay hosts")]
    NoRelayHosts(String),

    /// Two regions share the same id.
    #[error("Duplicate region id: {0}")]
    DuplicateRegion(String),
}

/// Errors constructing or driving a relay negotiation session.
#[derive(Error, Debug)]
pub enum NegotiationError {
    /// The execution environment cannot negotiate at all.
    #[error("Negotiation API unsupported: {0}")]
    Unsupported(String),

    /// An ICE server URL could not be understood.
    #[error("Invalid ICE server URL: {0}")]
    InvalidServerUrl(String),

    /// The ICE server description contained no URLs.
    #[error("ICE server has no URLs")]
    NoServerUrls,
}

/// Errors decoding STUN messages received from a relay.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StunError {
    /// Fewer bytes than a STUN header.
    #[error("STUN message too short: {0} bytes")]
    TooShort(usize),

    /// The magic cookie did not match.
    #[error("Not a STUN message (bad magic cookie)")]
    BadMagicCookie,

    /// Declared length runs past the datagram.
    #[error("STUN message length {declared} exceeds datagram ({available} bytes)")]
    Truncated {
        /// Length declared in the header or attribute
        declared: usize,
        /// Bytes actually available
        available: usize,
    },
}

/// Errors from the throughput/latency timer.
#[derive(Error, Debug)]
pub enum SpeedTestError {
    /// The login check did not succeed, so there is no upload target.
    #[error("Login check failed, no upload URL available")]
    LoginFailed,

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transfer itself failed.
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),

    /// No timing entry was recorded for the resource.
    #[error("No timing entry for {0}")]
    MissingTiming(String),

    /// The measured interval was zero, so no rate can be derived.
    #[error("Zero timing interval for {0}")]
    ZeroInterval(String),

    /// The requested upload size cannot be allocated on this target.
    #[error("Upload size of {0} MB is too large")]
    PayloadTooLarge(u64),
}

/// Errors from the collaborator API client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The API base URL is not configured.
    #[error("API URL not configured")]
    MissingApiUrl,

    /// The API key is not available.
    #[error("API key not configured")]
    MissingApiKey,

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),
}

/// Errors loading or saving the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Reading or writing the session file failed.
    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),

    /// The session file is not valid JSON.
    #[error("Session file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome categories counted across a diagnostics run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum OutcomeType {
    /// Probe succeeded and classified "good"
    SuccessGood,
    /// Probe succeeded and classified "degraded"
    SuccessDegraded,
    /// Probe hit its deadline
    Timeout,
    /// Negotiation session could not be constructed
    ConstructionError,
    /// Transport-level failure
    NetworkError,
}

impl std::fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutcomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::SuccessGood => "Success (good)",
            OutcomeType::SuccessDegraded => "Success (degraded)",
            OutcomeType::Timeout => "Timeout",
            OutcomeType::ConstructionError => "Construction failed",
            OutcomeType::NetworkError => "Network error",
        }
    }
}
