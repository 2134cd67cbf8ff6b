//! Network probes.
//!
//! This module provides:
//! - The [`ProbeResult`] record produced for every region by every prober
//! - Elapsed-time classification ("good" / "degraded")
//! - The latency prober (HTTP ping per region)
//! - The relay connectivity prober (negotiation race per region)

mod latency;
mod relay;

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use strum_macros::EnumIter as EnumIterMacro;

use crate::config::{CONNECTIVITY_GOOD_THRESHOLD_MS, LATENCY_GOOD_THRESHOLD_MS};

pub use latency::{random_token, LatencyProber};
pub use relay::{CandidateError, Negotiation, RelayNegotiator, RelayProber};

/// Which prober produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize)]
pub enum ProbeKind {
    /// Relay negotiation (UDP reachability)
    Connectivity,
    /// HTTP ping round trip
    Latency,
}

impl ProbeKind {
    /// Highest elapsed time still classified "good".
    pub fn good_threshold_ms(self) -> u64 {
        match self {
            ProbeKind::Connectivity => CONNECTIVITY_GOOD_THRESHOLD_MS,
            ProbeKind::Latency => LATENCY_GOOD_THRESHOLD_MS,
        }
    }

    /// Prefix of the session fields this prober writes.
    pub fn field_prefix(self) -> &'static str {
        match self {
            ProbeKind::Connectivity => "connectivity",
            ProbeKind::Latency => "latency",
        }
    }

    /// Session field holding the result for `region_id`.
    pub fn field_name(self, region_id: &str) -> String {
        format!("{}-{}", self.field_prefix(), region_id)
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_prefix())
    }
}

/// Display classification of a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    Good,
    Degraded,
}

/// Classifies an elapsed time against an inclusive "good" threshold.
pub fn classify(elapsed_millis: u64, good_threshold_ms: u64) -> Classification {
    if elapsed_millis <= good_threshold_ms {
        Classification::Good
    } else {
        Classification::Degraded
    }
}

/// Whole milliseconds of a duration, rounded down.
pub(crate) fn floor_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeOutcome {
    Success,
    Timeout,
    Error,
}

/// Why a probe did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureCause {
    /// The deadline fired first.
    Timeout,
    /// The negotiation session could not be built.
    ConstructionFailed(String),
    /// The request never completed at transport level.
    NetworkError(String),
}

impl FailureCause {
    pub fn is_construction(&self) -> bool {
        matches!(self, FailureCause::ConstructionFailed(_))
    }

    /// Short label shown in place of a timing.
    pub fn label(&self) -> &'static str {
        match self {
            FailureCause::Timeout => "TIMEOUT",
            FailureCause::ConstructionFailed(_) | FailureCause::NetworkError(_) => "FAILED",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Timeout => f.write_str("TIMEOUT"),
            FailureCause::ConstructionFailed(detail) => write!(f, "construction failed: {detail}"),
            FailureCause::NetworkError(detail) => write!(f, "network error: {detail}"),
        }
    }
}

/// Result of probing one region.
///
/// Built only through [`ProbeResult::success`], [`ProbeResult::timeout`] and
/// [`ProbeResult::error`]: `elapsed_millis` is present iff the outcome is
/// `Success`, `failure_cause` iff it is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    region_id: String,
    outcome: ProbeOutcome,
    elapsed_millis: Option<u64>,
    failure_cause: Option<FailureCause>,
    relay_host: Option<String>,
}

impl ProbeResult {
    pub fn success(region_id: impl Into<String>, elapsed_millis: u64) -> Self {
        Self {
            region_id: region_id.into(),
            outcome: ProbeOutcome::Success,
            elapsed_millis: Some(elapsed_millis),
            failure_cause: None,
            relay_host: None,
        }
    }

    pub fn timeout(region_id: impl Into<String>) -> Self {
        Self {
            region_id: region_id.into(),
            outcome: ProbeOutcome::Timeout,
            elapsed_millis: None,
            failure_cause: Some(FailureCause::Timeout),
            relay_host: None,
        }
    }

    pub fn error(region_id: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            region_id: region_id.into(),
            outcome: ProbeOutcome::Error,
            elapsed_millis: None,
            failure_cause: Some(cause),
            relay_host: None,
        }
    }

    /// Tags the result with the relay host that produced it.
    pub fn with_relay_host(mut self, host: impl Into<String>) -> Self {
        self.relay_host = Some(host.into());
        self
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn outcome(&self) -> ProbeOutcome {
        self.outcome
    }

    pub fn elapsed_millis(&self) -> Option<u64> {
        self.elapsed_millis
    }

    pub fn failure_cause(&self) -> Option<&FailureCause> {
        self.failure_cause.as_ref()
    }

    pub fn relay_host(&self) -> Option<&str> {
        self.relay_host.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ProbeOutcome::Success
    }

    /// Classification against the threshold of `kind`; `None` unless successful.
    pub fn classification(&self, kind: ProbeKind) -> Option<Classification> {
        self.elapsed_millis
            .map(|ms| classify(ms, kind.good_threshold_ms()))
    }

    /// Value stored in the session field: milliseconds or the failure label.
    pub fn display_value(&self) -> String {
        match (&self.elapsed_millis, &self.failure_cause) {
            (Some(ms), _) => ms.to_string(),
            (None, Some(cause)) => cause.label().to_string(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_threshold_boundary() {
        let good = ProbeResult::success("r", 300);
        let degraded = ProbeResult::success("r", 301);
        assert_eq!(
            good.classification(ProbeKind::Connectivity),
            Some(Classification::Good)
        );
        assert_eq!(
            degraded.classification(ProbeKind::Connectivity),
            Some(Classification::Degraded)
        );
    }

    #[test]
    fn test_latency_threshold_boundary() {
        assert_eq!(
            ProbeResult::success("r", 400).classification(ProbeKind::Latency),
            Some(Classification::Good)
        );
        assert_eq!(
            ProbeResult::success("r", 401).classification(ProbeKind::Latency),
            Some(Classification::Degraded)
        );
    }

    #[test]
    fn test_invariants_hold_by_construction() {
        let ok = ProbeResult::success("r", 12);
        assert_eq!(ok.elapsed_millis(), Some(12));
        assert!(ok.failure_cause().is_none());

        let timeout = ProbeResult::timeout("r");
        assert_eq!(timeout.outcome(), ProbeOutcome::Timeout);
        assert!(timeout.elapsed_millis().is_none());
        assert_eq!(timeout.failure_cause(), Some(&FailureCause::Timeout));
        assert!(timeout.classification(ProbeKind::Connectivity).is_none());

        let err = ProbeResult::error("r", FailureCause::ConstructionFailed("x".into()));
        assert_eq!(err.outcome(), ProbeOutcome::Error);
        assert!(err.elapsed_millis().is_none());
    }

    #[test]
    fn test_display_values() {
        assert_eq!(ProbeResult::success("r", 87).display_value(), "87");
        assert_eq!(ProbeResult::timeout("r").display_value(), "TIMEOUT");
        assert_eq!(
            ProbeResult::error("r", FailureCause::ConstructionFailed("x".into())).display_value(),
            "FAILED"
        );
    }

    #[test]
    fn test_field_names() {
        assert_eq!(
            ProbeKind::Connectivity.field_name("us-east-1"),
            "connectivity-us-east-1"
        );
        assert_eq!(ProbeKind::Latency.field_name("eu-west-2"), "latency-eu-west-2");
    }

    #[test]
    fn test_floor_millis_rounds_down() {
        assert_eq!(floor_millis(Duration::from_micros(1999)), 1);
        assert_eq!(floor_millis(Duration::from_millis(1000)), 1000);
    }
}
