//! Relay connectivity prober.
//!
//! Proves UDP reachability of each region's relay by starting a negotiation
//! against it and waiting for the relay's authentication challenge. Reaching
//! the challenge is enough: no authenticated allocation is ever made.
//!
//! The negotiation itself sits behind [`RelayNegotiator`] / [`Negotiation`];
//! `crate::turn` provides the UDP implementation.

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{floor_millis, FailureCause, ProbeKind, ProbeOutcome, ProbeResult};
use crate::config::{
    AggregationPolicy, AUTH_CHALLENGE_ERROR_CODE, PROBE_DATA_CHANNEL_LABEL,
    RELAY_NEGOTIATION_TIMEOUT,
};
use crate::error_handling::NegotiationError;
use crate::registry::{IceServer, RegionTarget, Registry};
use crate::sink::ResultSink;

/// A candidate gathering failure reported by a negotiation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateError {
    /// ICE server URL the error came from
    pub url: String,
    /// STUN error code (401 for an authentication challenge)
    pub error_code: u16,
    pub error_text: String,
}

/// One negotiation session against a set of relay servers.
pub trait Negotiation {
    /// Opens a data channel. Without one, gathering produces no candidates.
    fn create_data_channel(&mut self, label: &str);

    /// Applies the local offer and starts candidate gathering.
    ///
    /// Candidate errors arrive on the returned channel; the channel closes
    /// once gathering has finished.
    fn start_gathering(&mut self) -> mpsc::UnboundedReceiver<CandidateError>;

    /// Releases everything the session holds. Idempotent.
    fn close(&mut self);
}

/// Factory for negotiation sessions.
pub trait RelayNegotiator {
    type Session: Negotiation;

    /// Builds a session configured with `server` as its only (relay) ICE server.
    ///
    /// # Errors
    ///
    /// Any error means the session could not be constructed at all.
    fn open(&self, server: &IceServer) -> Result<Self::Session, NegotiationError>;
}

/// Sequential relay connectivity prober.
pub struct RelayProber<N> {
    negotiator: N,
    policy: AggregationPolicy,
}

impl<N: RelayNegotiator> RelayProber<N> {
    pub fn new(negotiator: N, policy: AggregationPolicy) -> Self {
        Self { negotiator, policy }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Probes every region in registry order, one at a time.
    ///
    /// Always returns exactly one result per region; a failing region never
    /// stops the ones after it.
    pub async fn probe_all(
        &self,
        registry: &Registry,
        sink: &mut dyn ResultSink,
    ) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(registry.len());
        for target in registry {
            let result = self.probe_region(target).await;
            sink.record_probe_result(ProbeKind::Connectivity, &result);
            results.push(result);
        }
        results
    }

    /// Probes one region according to the aggregation policy.
    pub async fn probe_region(&self, target: &RegionTarget) -> ProbeResult {
        let region_id = target.region_id();
        let hosts = target.relay_hosts();

        let result = match self.policy {
            AggregationPolicy::AnyHost => self.probe_hosts(region_id, hosts).await,
            AggregationPolicy::FirstHost => self.probe_hosts(region_id, &hosts[..1]).await,
            AggregationPolicy::BestOf => {
                let mut per_host = Vec::with_capacity(hosts.len());
                for host in hosts {
                    let result = self
                        .probe_hosts(region_id, std::slice::from_ref(host))
                        .await;
                    per_host.push(result.with_relay_host(host.as_str()));
                }
                best_of(region_id, per_host)
            }
        };

        match result.outcome() {
            ProbeOutcome::Success => info!(
                "UDP tests completed to region {} in {} ms",
                region_id,
                result.elapsed_millis().unwrap_or_default()
            ),
            ProbeOutcome::Timeout => {
                warn!("UDP tests failed to region {}: TIMEOUT", region_id)
            }
            ProbeOutcome::Error => error!(
                "Failed to test relay in region {}: {}",
                region_id,
                result
                    .failure_cause()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ),
        }
        result
    }

    /// Runs one negotiation session covering `hosts`.
    async fn probe_hosts(&self, region_id: &str, hosts: &[String]) -> ProbeResult {
        let server = IceServer::for_relay_hosts(hosts);
        info!(
            "Testing relay connectivity for {}: {}",
            region_id,
            serde_json::to_string(&server).unwrap_or_else(|_| server.urls.join(","))
        );

        let mut session = match self.negotiator.open(&server) {
            Ok(session) => session,
            Err(e) => {
                return ProbeResult::error(region_id, FailureCause::ConstructionFailed(e.to_string()))
            }
        };

        session.create_data_channel(PROBE_DATA_CHANNEL_LABEL);
        let result = race_negotiation(&mut session, region_id).await;
        session.close();
        result
    }
}

/// Races the first authentication challenge against the negotiation deadline.
///
/// The clock starts once gathering has started. Candidate errors other than
/// the challenge are ignored; if gathering ends without one, the deadline is
/// still awaited so the outcome is a timeout, never an early failure.
async fn race_negotiation<S: Negotiation>(session: &mut S, region_id: &str) -> ProbeResult {
    let mut candidate_errors = session.start_gathering();
    let start = Instant::now();
    let deadline = tokio::time::sleep(RELAY_NEGOTIATION_TIMEOUT);
    tokio::pin!(deadline);
    let mut gathering = true;

    loop {
        tokio::select! {
            biased;
            candidate = candidate_errors.recv(), if gathering => match candidate {
                Some(err) if err.error_code == AUTH_CHALLENGE_ERROR_CODE => {
                    let elapsed = floor_millis(start.elapsed());
                    let host = crate::turn::parse_turn_url(&err.url)
                        .map(|(host, _)| host)
                        .unwrap_or(err.url);
                    return ProbeResult::success(region_id, elapsed).with_relay_host(host);
                }
                Some(err) => {
                    debug!(
                        "Ignoring candidate error {} from {} for {}: {}",
                        err.error_code, err.url, region_id, err.error_text
                    );
                }
                None => {
                    debug!("Candidate gathering for {} ended without a challenge", region_id);
                    gathering = false;
                }
            },
            _ = &mut deadline => return ProbeResult::timeout(region_id),
        }
    }
}

/// Combines per-host results: fastest success, else a timeout, else the first error.
pub(crate) fn best_of(region_id: &str, per_host: Vec<ProbeResult>) -> ProbeResult {
    let fastest = per_host
        .iter()
        .filter(|r| r.is_success())
        .min_by_key(|r| r.elapsed_millis().unwrap_or(u64::MAX));
    if let Some(best) = fastest {
        return best.clone();
    }
    if let Some(timeout) = per_host
        .iter()
        .find(|r| r.outcome() == ProbeOutcome::Timeout)
    {
        return timeout.clone();
    }
    per_host.into_iter().next().unwrap_or_else(|| {
        ProbeResult::error(
            region_id,
            FailureCause::NetworkError("no relay hosts probed".into()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_of_prefers_fastest_success() {
        let result = best_of(
            "r",
            vec![
                ProbeResult::success("r", 250).with_relay_host("a"),
                ProbeResult::timeout("r").with_relay_host("b"),
                ProbeResult::success("r", 90).with_relay_host("c"),
            ],
        );
        assert_eq!(result.elapsed_millis(), Some(90));
        assert_eq!(result.relay_host(), Some("c"));
    }

    #[test]
    fn test_best_of_timeout_beats_error() {
        let result = best_of(
            "r",
            vec![
                ProbeResult::error("r", FailureCause::ConstructionFailed("x".into())),
                ProbeResult::timeout("r"),
            ],
        );
        assert_eq!(result.outcome(), ProbeOutcome::Timeout);
    }

    #[test]
    fn test_best_of_all_errors_keeps_first() {
        let result = best_of(
            "r",
            vec![
                ProbeResult::error("r", FailureCause::ConstructionFailed("first".into())),
                ProbeResult::error("r", FailureCause::NetworkError("second".into())),
            ],
        );
        assert_eq!(
            result.failure_cause(),
            Some(&FailureCause::ConstructionFailed("first".into()))
        );
    }

    #[test]
    fn test_best_of_empty() {
        assert_eq!(best_of("r", Vec::new()).outcome(), ProbeOutcome::Error);
    }
}
