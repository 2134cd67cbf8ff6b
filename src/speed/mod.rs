//! Throughput and latency timer.
//!
//! Transfers are timed from per-resource timing entries (request start,
//! response start, response end) recorded into a [`PerformanceTimeline`]
//! rather than by clocking the whole call. Timed requests whose interval
//! starts at request start are preceded by an untimed `HEAD` to the same URL
//! so the pooled connection (DNS, TCP, TLS) already exists when the clock
//! starts.

mod timeline;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use url::Url;

use crate::config::{CACHE_BUSTER_RANGE, DOWNLOAD_FIXTURE_DIR, LATENCY_FIXTURE_PATH};
use crate::error_handling::SpeedTestError;
use crate::probe::floor_millis;

pub use timeline::{PerformanceTimeline, ResourceTiming};

/// The three speed test measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpeedMetric {
    Download,
    Upload,
    Latency,
}

impl SpeedMetric {
    /// Session field holding the measurement.
    pub fn field_name(self) -> &'static str {
        match self {
            SpeedMetric::Download => "downloadSpeed",
            SpeedMetric::Upload => "uploadSpeed",
            SpeedMetric::Latency => "latency",
        }
    }
}

/// Megabits per second for `size_mb` megabytes moved in `seconds`.
pub fn megabits_per_second(size_mb: u64, seconds: f64) -> f64 {
    size_mb as f64 * 8.0 / seconds
}

/// Upload payload length in bytes for `size_mb` mebibytes.
///
/// # Errors
///
/// Returns `SpeedTestError::PayloadTooLarge` if the length does not fit in
/// memory addressing on this target.
pub fn payload_len(size_mb: u64) -> Result<usize, SpeedTestError> {
    size_mb
        .checked_mul(1024 * 1024)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or(SpeedTestError::PayloadTooLarge(size_mb))
}

/// Two-decimal presentation of a rate.
pub fn format_speed(mbps: f64) -> String {
    format!("{:.2}", mbps)
}

/// Results of a completed speed test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedReport {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub latency_ms: u64,
}

/// Times fixture downloads, uploads and a latency fetch against one site.
pub struct SpeedTimer {
    client: Arc<reqwest::Client>,
    site_url: Url,
    timeline: PerformanceTimeline,
}

impl SpeedTimer {
    /// Creates a timer for the site hosting the fixtures.
    ///
    /// # Errors
    ///
    /// Returns `SpeedTestError::InvalidUrl` if `site_url` does not parse.
    pub fn new(client: Arc<reqwest::Client>, site_url: &str) -> Result<Self, SpeedTestError> {
        let mut site_url = Url::parse(site_url)?;
        if !site_url.path().ends_with('/') {
            let path = format!("{}/", site_url.path());
            site_url.set_path(&path);
        }
        Ok(Self {
            client,
            site_url,
            timeline: PerformanceTimeline::new(),
        })
    }

    pub fn timeline(&self) -> &PerformanceTimeline {
        &self.timeline
    }

    /// Downloads the `size_mb` fixture and returns the transfer time in seconds.
    ///
    /// Measured from response start to response end.
    pub async fn time_download(&mut self, size_mb: u64) -> Result<f64, SpeedTestError> {
        let url = self
            .site_url
            .join(&format!("{}/{}mb.test", DOWNLOAD_FIXTURE_DIR, size_mb))?;
        self.fetch(self.client.get(url.clone()), &url).await?;

        let entry = self.last_entry(&url)?;
        interval_seconds(entry.response_end - entry.response_start, &url)
    }

    /// Uploads `size_mb` megabytes of zeros and returns the time in seconds.
    ///
    /// Measured from request start to response start.
    pub async fn time_upload(
        &mut self,
        size_mb: u64,
        upload_url: &str,
    ) -> Result<f64, SpeedTestError> {
        let url = Url::parse(upload_url)?;
        let payload = vec![0u8; payload_len(size_mb)?];
        self.warm_connection(&url).await;
        let request = self
            .client
            .put(url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(payload);
        self.fetch(request, &url).await?;

        let entry = self.last_entry(&url)?;
        interval_seconds(entry.response_start - entry.request_start, &url)
    }

    /// Fetches the cache-busted 1x1 fixture and returns whole milliseconds
    /// from request start to response start.
    pub async fn time_latency(&mut self) -> Result<u64, SpeedTestError> {
        let cache_buster = rand::random_range(0..CACHE_BUSTER_RANGE);
        let url = self
            .site_url
            .join(&format!("{}?t={}", LATENCY_FIXTURE_PATH, cache_buster))?;
        self.warm_connection(&url).await;
        self.fetch(self.client.get(url.clone()), &url).await?;

        let entry = self.last_entry(&url)?;
        Ok(floor_millis(entry.response_start - entry.request_start))
    }

    /// Runs download, upload and latency in order; the first failure aborts the rest.
    pub async fn run(
        &mut self,
        download_size_mb: u64,
        upload_size_mb: u64,
        upload_url: &str,
    ) -> Result<SpeedReport, SpeedTestError> {
        let seconds = self.time_download(download_size_mb).await?;
        let download_mbps = megabits_per_second(download_size_mb, seconds);
        info!("Download speed: {} Mb/s", format_speed(download_mbps));

        let seconds = self.time_upload(upload_size_mb, upload_url).await?;
        let upload_mbps = megabits_per_second(upload_size_mb, seconds);
        info!("Upload speed: {} Mb/s", format_speed(upload_mbps));

        let latency_ms = self.time_latency().await?;
        info!("Latency: {} ms", latency_ms);

        Ok(SpeedReport {
            download_mbps,
            upload_mbps,
            latency_ms,
        })
    }

    /// Opens a pooled connection to the origin of `url` without timing it.
    ///
    /// Failures are only logged; the timed request reports them.
    async fn warm_connection(&self, url: &Url) {
        match self.client.head(url.clone()).send().await {
            Ok(response) => debug!(
                "Warmed connection to {} ({})",
                url.origin().ascii_serialization(),
                response.status()
            ),
            Err(e) => debug!("Warm-up request to {} failed: {}", url, e),
        }
    }

    /// Sends a request, drains the body and records its timing entry.
    async fn fetch(
        &mut self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<(), SpeedTestError> {
        let request_start = self.timeline.now();
        let mut response = request.send().await?.error_for_status()?;
        let response_start = self.timeline.now();

        let mut received = 0usize;
        while let Some(chunk) = response.chunk().await? {
            received += chunk.len();
        }
        let response_end = self.timeline.now();
        debug!("Fetched {} ({} bytes)", url, received);

        self.timeline.push(ResourceTiming {
            name: url.to_string(),
            request_start,
            response_start,
            response_end,
        });
        Ok(())
    }

    fn last_entry(&self, url: &Url) -> Result<&ResourceTiming, SpeedTestError> {
        self.timeline
            .last_matching(url.as_str())
            .ok_or_else(|| SpeedTestError::MissingTiming(url.to_string()))
    }
}

fn interval_seconds(interval: Duration, url: &Url) -> Result<f64, SpeedTestError> {
    if interval.is_zero() {
        return Err(SpeedTestError::ZeroInterval(url.to_string()));
    }
    Ok(interval.as_secs_f64())
}
