//! Configuration constants.
//!
//! This module defines the fixed constants used by the diagnostics engine,
//! including probe deadlines, classification thresholds and fixture paths.

use std::time::Duration;

// Relay connectivity
/// Deadline for a relay negotiation to produce an authentication challenge.
///
/// Fixed for every probe; not configurable per call.
pub const RELAY_NEGOTIATION_TIMEOUT: Duration = Duration::from_millis(1000);
/// Port the relay hosts listen on for TURN over UDP
pub const TURN_PORT: u16 = 3478;
/// Placeholder username handed to the relay. The probe never completes an allocation.
pub const RELAY_USERNAME: &str = "test";
/// Placeholder credential handed to the relay
pub const RELAY_CREDENTIAL: &str = "test";
/// Candidate error code for "authentication challenge received"
pub const AUTH_CHALLENGE_ERROR_CODE: u16 = 401;
/// Candidate error code reported when a relay host cannot be reached at all
pub const UNREACHABLE_ERROR_CODE: u16 = 701;
/// Interval between Allocate retransmissions while waiting for a relay to answer
pub const STUN_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(250);
/// Label of the throwaway data channel that forces candidate gathering
pub const PROBE_DATA_CHANNEL_LABEL: &str = "";

// Classification thresholds (display only)
/// Relay negotiation times at or below this are "good"
pub const CONNECTIVITY_GOOD_THRESHOLD_MS: u64 = 300;
/// Ping round trips at or below this are "good"
pub const LATENCY_GOOD_THRESHOLD_MS: u64 = 400;

// Latency ping
/// Default upper bound on a single ping.
///
/// Without a bound an unresponsive endpoint stalls the whole run.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);

// Speed test fixtures
/// Size of the download fixture in megabytes
pub const DOWNLOAD_SIZE_MB: u64 = 50;
/// Size of the synthetic upload payload in megabytes
pub const UPLOAD_SIZE_MB: u64 = 10;
/// Upper bound (exclusive) of the latency fixture cache buster
pub const CACHE_BUSTER_RANGE: u32 = 100_000;
/// Path of the latency fixture relative to the site URL
pub const LATENCY_FIXTURE_PATH: &str = "img/1x1.png";
/// Directory of the download fixtures relative to the site URL
pub const DOWNLOAD_FIXTURE_DIR: &str = "test_files";

// HTTP
/// Per-request timeout in seconds for collaborator and fixture calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// TCP connection timeout in seconds
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Header carrying the customer API key
pub const API_KEY_HEADER: &str = "x-api-key";
/// Default public IP / geolocation service
pub const DEFAULT_GEO_URL: &str = "https://get.geojs.io/v1/";
/// Value stored when the public IP cannot be determined
pub const UNKNOWN_IP: &str = "unknown";

/// Default User-Agent string for HTTP requests.
pub const DEFAULT_USER_AGENT: &str = concat!("readiness_check/", env!("CARGO_PKG_VERSION"));

// Session
/// Default location of the persisted session state
pub const DEFAULT_SESSION_PATH: &str = "./readiness_session.json";

// Messages
/// Dialog title shown when the speed stage fails
pub const SPEED_FAILED_TITLE: &str = "Speed tests failed";
/// Dialog message shown when the speed stage fails
pub const SPEED_FAILED_MESSAGE: &str =
    "Speed tests failed to run, please check your network connectivity";
