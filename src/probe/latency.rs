//! Latency prober.
//!
//! Measures the round trip to each region's ping endpoint, one region at a
//! time. The endpoint does not return anything meaningful: completion of the
//! exchange is the signal and the body is never read.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

use super::{floor_millis, FailureCause, ProbeKind, ProbeResult};
use crate::registry::{RegionTarget, Registry};
use crate::sink::ResultSink;

/// Sequential HTTP ping prober.
pub struct LatencyProber {
    client: Arc<reqwest::Client>,
    ping_timeout: Option<Duration>,
}

impl LatencyProber {
    /// Creates a prober.
    ///
    /// `ping_timeout` bounds a single ping. `None` waits for as long as the
    /// HTTP client does, which lets one unresponsive endpoint stall the run.
    pub fn new(client: Arc<reqwest::Client>, ping_timeout: Option<Duration>) -> Self {
        Self {
            client,
            ping_timeout,
        }
    }

    /// Pings every region of `regions` in order, one outstanding ping at a time.
    ///
    /// Takes the registry by value: the prober works on its own copy.
    pub async fn probe_all(
        &self,
        regions: Registry,
        sink: &mut dyn ResultSink,
    ) -> Vec<ProbeResult> {
        let targets = regions.targets();
        let mut results = Vec::with_capacity(targets.len());
        let mut cursor = 0;

        while cursor < targets.len() {
            let target = &targets[cursor];
            let result = self.ping(target).await;
            sink.record_probe_result(ProbeKind::Latency, &result);
            results.push(result);
            cursor += 1;
        }

        info!("Latency tests complete for {} regions", results.len());
        results
    }

    /// Pings one region.
    pub async fn ping(&self, target: &RegionTarget) -> ProbeResult {
        let url = target.ping_url(&random_token());
        debug!("Pinging {} via {}", target.region_id(), url);

        let start = Instant::now();
        let request = self.client.get(&url).send();
        let response = match self.ping_timeout {
            Some(bound) => match tokio::time::timeout(bound, request).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(
                        "Ping to {} gave no answer within {}ms; reporting timeout instead of stalling the run",
                        target.region_id(),
                        bound.as_millis()
                    );
                    return ProbeResult::timeout(target.region_id());
                }
            },
            None => request.await,
        };

        match response {
            // Status and body are irrelevant; dropping the response discards the body.
            Ok(_) => {
                let elapsed = floor_millis(start.elapsed());
                info!("Latency to {}: {} ms", target.region_id(), elapsed);
                ProbeResult::success(target.region_id(), elapsed)
            }
            Err(e) if e.is_timeout() => {
                warn!("Ping to {} timed out: {}", target.region_id(), e);
                ProbeResult::timeout(target.region_id())
            }
            Err(e) => {
                warn!("Ping to {} failed: {}", target.region_id(), e);
                ProbeResult::error(target.region_id(), FailureCause::NetworkError(e.to_string()))
            }
        }
    }
}

/// Random base-36 token used to defeat caches on the ping URL.
pub fn random_token() -> String {
    to_base36(rand::random::<u64>())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(13);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
