//! readiness_check library: network readiness diagnostics
//!
//! This library checks whether a machine's network is ready for contact-centre
//! media: UDP reachability of regional TURN relays (timed by how long the relay
//! takes to challenge an unauthenticated allocation), HTTP round-trip latency
//! to every region, and download / upload throughput against a fixture site.
//!
//! # Example
//!
//! ```no_run
//! use readiness_check::{run_network_diagnostics, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     ping_timeout: Some(std::time::Duration::from_secs(5)),
//!     ..Default::default()
//! };
//!
//! let report = run_network_diagnostics(config).await?;
//! println!(
//!     "{} of {} regions reachable over UDP",
//!     report.reachable_regions(),
//!     report.connectivity.len()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

pub mod api;
mod app;
pub mod config;
pub mod error_handling;
pub mod initialization;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod session;
pub mod sink;
pub mod speed;
pub mod turn;

// Re-export public API
pub use config::{AggregationPolicy, Command, Config, LogFormat, LogLevel, Opt};
pub use probe::{ProbeKind, ProbeOutcome, ProbeResult};
pub use registry::{RegionTarget, Registry};
pub use run::{
    reset_session, run_network_diagnostics, run_speed_test, submit_results, DiagnosticsReport,
};
pub use speed::SpeedReport;

// Internal run module (ties configuration, session store and console together)
mod run {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Instant;

    use anyhow::{Context, Result};
    use log::info;

    use crate::api::{ApiClient, GeoClient};
    use crate::app::{print_probe_statistics, print_simple_summary, ConsoleSink};
    use crate::config::Config;
    use crate::error_handling::ApiError;
    use crate::initialization::init_client;
    use crate::orchestrator::{run_speed_stage, DiagnosticsOrchestrator};
    use crate::probe::{LatencyProber, ProbeResult, RelayProber};
    use crate::registry::Registry;
    use crate::session::{SessionResults, SessionState, SessionStore, Stage};
    use crate::speed::{SpeedReport, SpeedTimer};
    use crate::turn::UdpRelayNegotiator;

    /// Results of a network diagnostics run.
    #[derive(Debug, Clone)]
    pub struct DiagnosticsReport {
        /// Relay connectivity result per region, in registry order
        pub connectivity: Vec<ProbeResult>,
        /// Latency result per region, in registry order
        pub latency: Vec<ProbeResult>,
        /// Where the session (with every result field) was saved
        pub session_path: PathBuf,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    impl DiagnosticsReport {
        /// Regions whose relay answered within the deadline.
        pub fn reachable_regions(&self) -> usize {
            self.connectivity.iter().filter(|r| r.is_success()).count()
        }
    }

    /// Loads the stored session, or starts a new one with device and geo details.
    async fn load_or_init_session(
        config: &Config,
        client: &Arc<reqwest::Client>,
        store: &SessionStore,
    ) -> Result<SessionState> {
        if let Some(mut state) = store
            .load()
            .await
            .with_context(|| format!("Failed to load session from {}", store.path().display()))?
        {
            if let Some(api_key) = &config.api_key {
                state.results.set_api_key(api_key.clone());
            }
            return Ok(state);
        }

        info!("Starting a new session");
        let mut results = SessionResults::new(config.api_key.clone());
        results.set("userAgent", config.user_agent.clone());
        {
            let objects = results.objects_mut();
            objects.browser = Some(config.user_agent.clone());
            objects.os = Some(std::env::consts::OS.to_string());
            objects.platform = Some(std::env::consts::ARCH.to_string());
            objects.engine = Some("reqwest".to_string());
        }

        let geo = GeoClient::new(Arc::clone(client), &config.geo_url)
            .context("Invalid geolocation service URL")?;
        let ip = geo.public_ip().await;
        results.objects_mut().geo_ip = Some(geo.geo_data(&ip).await);
        results.set("ip", ip);

        Ok(SessionState {
            results,
            stages: Default::default(),
        })
    }

    /// Runs relay connectivity and latency tests against every region.
    ///
    /// Results are printed as they arrive and written into the session, which
    /// is saved afterwards so a later `submit` can send them.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The HTTP client cannot be built
    /// - The session file cannot be read or written
    ///
    /// Probe failures are never errors; they are reported per region.
    pub async fn run_network_diagnostics(config: Config) -> Result<DiagnosticsReport> {
        let client = init_client(&config).context("Failed to initialize HTTP client")?;
        let store = SessionStore::new(&config.session_path);
        let mut state = load_or_init_session(&config, &client, &store).await?;

        let registry = Registry::default_regions();
        let mut orchestrator = DiagnosticsOrchestrator::new(
            registry.clone(),
            RelayProber::new(UdpRelayNegotiator::new(), config.aggregation),
            LatencyProber::new(Arc::clone(&client), config.ping_timeout),
        );
        let mut sink = ConsoleSink::new(&registry);

        let start_time = Instant::now();
        let report = orchestrator
            .run_network_tests(&mut state.results, &mut sink)
            .await;
        let elapsed_seconds = start_time.elapsed().as_secs_f64();

        store
            .save(&state)
            .await
            .context("Failed to save session")?;

        print_probe_statistics(orchestrator.stats());
        print_simple_summary(orchestrator.stats(), elapsed_seconds);

        Ok(DiagnosticsReport {
            connectivity: report.connectivity,
            latency: report.latency,
            session_path: config.session_path.clone(),
            elapsed_seconds,
        })
    }

    /// Measures download speed, upload speed and latency.
    ///
    /// The session is saved whether or not the measurement succeeds, so an
    /// errored network stage is remembered.
    ///
    /// # Errors
    ///
    /// Returns an error if the site or API URL is missing or invalid, or if
    /// any step of the speed test fails.
    pub async fn run_speed_test(config: Config) -> Result<SpeedReport> {
        let site_url = config
            .site_url
            .as_deref()
            .context("Speed test site URL not configured")?;
        let api_url = config.api_url.as_deref().ok_or(ApiError::MissingApiUrl)?;

        let client = init_client(&config).context("Failed to initialize HTTP client")?;
        let api = ApiClient::new(Arc::clone(&client), api_url).context("Invalid API URL")?;
        let mut timer =
            SpeedTimer::new(Arc::clone(&client), site_url).context("Invalid site URL")?;

        let store = SessionStore::new(&config.session_path);
        let mut state = load_or_init_session(&config, &client, &store).await?;
        let mut sink = ConsoleSink::new(&Registry::default_regions());

        let outcome = run_speed_stage(
            &api,
            &mut timer,
            config.download_size_mb,
            config.upload_size_mb,
            &mut state,
            &mut sink,
        )
        .await;

        store
            .save(&state)
            .await
            .context("Failed to save session")?;

        outcome.context("Speed tests failed")
    }

    /// Submits the stored session results.
    ///
    /// Returns the number of fields sent.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no stored session, the API is not
    /// configured, or the submission is rejected.
    pub async fn submit_results(config: Config) -> Result<usize> {
        let api_url = config.api_url.as_deref().ok_or(ApiError::MissingApiUrl)?;
        let client = init_client(&config).context("Failed to initialize HTTP client")?;
        let api = ApiClient::new(client, api_url).context("Invalid API URL")?;

        let store = SessionStore::new(&config.session_path);
        let mut state = store
            .load()
            .await
            .context("Failed to load session")?
            .context("No session results to submit; run the network tests first")?;
        if let Some(api_key) = &config.api_key {
            state.results.set_api_key(api_key.clone());
        }

        api.submit_results(&state.results)
            .await
            .context("Failed to submit results")?;

        state.stages.page_success(Stage::Submit);
        store
            .save(&state)
            .await
            .context("Failed to save session")?;

        Ok(state.results.submission_body().len())
    }

    /// Clears the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file exists but cannot be removed.
    pub async fn reset_session(config: Config) -> Result<()> {
        SessionStore::new(&config.session_path)
            .clear()
            .await
            .context("Failed to clear session")?;
        info!("Session cleared");
        Ok(())
    }
}
