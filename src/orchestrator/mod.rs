//! Diagnostics orchestrator.
//!
//! Drives the network stage: relay connectivity over every region, then
//! latency over a copy of the registry, writing each result into the session
//! as it arrives. Also runs the speed stage, which depends on a fresh upload
//! URL from the login check.

use log::{error, info};

use crate::api::ApiClient;
use crate::config::{SPEED_FAILED_MESSAGE, SPEED_FAILED_TITLE};
use crate::error_handling::{ProbeStats, SpeedTestError};
use crate::probe::{LatencyProber, ProbeKind, ProbeResult, RelayNegotiator, RelayProber};
use crate::registry::{RegionTarget, Registry};
use crate::session::{
    LoginResult, SessionResults, SessionState, Stage, NETWORK_TESTS_RUN_FIELD,
};
use crate::sink::ResultSink;
use crate::speed::{format_speed, megabits_per_second, SpeedMetric, SpeedReport, SpeedTimer};

/// Network stage progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStageState {
    NotRun,
    Running,
    Complete,
}

/// Results of one network stage run, in registry order.
#[derive(Debug, Clone, Default)]
pub struct NetworkTestReport {
    pub connectivity: Vec<ProbeResult>,
    pub latency: Vec<ProbeResult>,
}

/// Forwards to the caller's sink after writing the session field and counting the outcome.
struct SessionRecorder<'a> {
    session: &'a mut SessionResults,
    stats: &'a ProbeStats,
    inner: &'a mut dyn ResultSink,
}

impl ResultSink for SessionRecorder<'_> {
    fn record_probe_result(&mut self, kind: ProbeKind, result: &ProbeResult) {
        self.session
            .set(kind.field_name(result.region_id()), result.display_value());
        self.stats.record(kind, result);
        self.inner.record_probe_result(kind, result);
    }

    fn reset_region(&mut self, target: &RegionTarget) {
        self.inner.reset_region(target);
    }
}

/// Runs the network stage against one registry.
pub struct DiagnosticsOrchestrator<N> {
    registry: Registry,
    relay: RelayProber<N>,
    latency: LatencyProber,
    stats: ProbeStats,
    state: NetworkStageState,
}

impl<N: RelayNegotiator> DiagnosticsOrchestrator<N> {
    pub fn new(registry: Registry, relay: RelayProber<N>, latency: LatencyProber) -> Self {
        Self {
            registry,
            relay,
            latency,
            stats: ProbeStats::new(),
            state: NetworkStageState::NotRun,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> NetworkStageState {
        self.state
    }

    /// Outcome counts across every run of this orchestrator.
    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }

    /// Runs relay connectivity then latency over every region.
    ///
    /// Results already written to the session stay there; nothing is rolled back.
    pub async fn run_network_tests(
        &mut self,
        session: &mut SessionResults,
        sink: &mut dyn ResultSink,
    ) -> NetworkTestReport {
        self.state = NetworkStageState::Running;
        sink.set_controls_visible(false);
        session.set(NETWORK_TESTS_RUN_FIELD, "false");
        for target in &self.registry {
            sink.reset_region(target);
        }

        let mut recorder = SessionRecorder {
            session: &mut *session,
            stats: &self.stats,
            inner: &mut *sink,
        };

        info!(
            "Running connectivity tests against {} regions ({:?})",
            self.registry.len(),
            self.relay.policy()
        );
        let connectivity = self.relay.probe_all(&self.registry, &mut recorder).await;

        info!("Running latency tests");
        let latency = self
            .latency
            .probe_all(self.registry.clone(), &mut recorder)
            .await;

        session.set(NETWORK_TESTS_RUN_FIELD, "true");
        self.state = NetworkStageState::Complete;
        sink.set_controls_visible(true);

        NetworkTestReport {
            connectivity,
            latency,
        }
    }
}

/// Runs the speed stage: login refresh, download, upload, latency.
///
/// Any failure aborts the remaining steps, marks the network stage errored
/// and shows the failure dialog. Measurements already shown stay shown.
pub async fn run_speed_stage(
    api: &ApiClient,
    timer: &mut SpeedTimer,
    download_size_mb: u64,
    upload_size_mb: u64,
    state: &mut SessionState,
    sink: &mut dyn ResultSink,
) -> Result<SpeedReport, SpeedTestError> {
    let result = measure(
        api,
        timer,
        download_size_mb,
        upload_size_mb,
        &mut state.results,
        sink,
    )
    .await;

    match result {
        Ok(report) => {
            sink.set_controls_visible(true);
            Ok(report)
        }
        Err(e) => {
            error!("Speed tests failed to run: {}", e);
            state.stages.page_error(Stage::Network);
            sink.show_message(SPEED_FAILED_TITLE, SPEED_FAILED_MESSAGE);
            Err(e)
        }
    }
}

async fn measure(
    api: &ApiClient,
    timer: &mut SpeedTimer,
    download_size_mb: u64,
    upload_size_mb: u64,
    results: &mut SessionResults,
    sink: &mut dyn ResultSink,
) -> Result<SpeedReport, SpeedTestError> {
    let login = match results.api_key() {
        Some(api_key) => api.check_login(api_key).await,
        None => LoginResult::failed(),
    };
    info!("Refetched signed upload url (login ok: {})", login.success);
    results.objects_mut().login = Some(login.clone());
    let upload_url = match login {
        LoginResult {
            success: true,
            upload_url: Some(url),
        } => url,
        _ => return Err(SpeedTestError::LoginFailed),
    };

    sink.speed_started(SpeedMetric::Download);
    let seconds = timer.time_download(download_size_mb).await?;
    let download_mbps = megabits_per_second(download_size_mb, seconds);
    record(results, sink, SpeedMetric::Download, format_speed(download_mbps));

    sink.speed_started(SpeedMetric::Upload);
    let seconds = timer.time_upload(upload_size_mb, &upload_url).await?;
    let upload_mbps = megabits_per_second(upload_size_mb, seconds);
    record(results, sink, SpeedMetric::Upload, format_speed(upload_mbps));

    sink.speed_started(SpeedMetric::Latency);
    let latency_ms = timer.time_latency().await?;
    record(results, sink, SpeedMetric::Latency, latency_ms.to_string());

    Ok(SpeedReport {
        download_mbps,
        upload_mbps,
        latency_ms,
    })
}

fn record(
    results: &mut SessionResults,
    sink: &mut dyn ResultSink,
    metric: SpeedMetric,
    value: String,
) {
    info!("{}: {}", metric.field_name(), value);
    sink.record_speed(metric, &value);
    results.set(metric.field_name(), value);
}
