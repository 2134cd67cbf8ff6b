//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::constants::{
    DEFAULT_GEO_URL, DEFAULT_PING_TIMEOUT, DEFAULT_SESSION_PATH, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT, DOWNLOAD_SIZE_MB, UPLOAD_SIZE_MB,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// How the results of a region's relay hosts are combined into one outcome.
///
/// Regions may list several relay hosts. Which of them decides the region's
/// connectivity result is a policy choice, so it is configurable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AggregationPolicy {
    /// One negotiation session containing every relay host; the first
    /// authentication challenge from any host wins.
    #[default]
    AnyHost,
    /// Only the first relay host is probed.
    FirstHost,
    /// Every host is probed in its own session; the fastest success wins.
    BestOf,
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by the library. It can be
/// constructed programmatically without any CLI dependencies.
///
/// # Examples
///
/// ```no_run
/// use readiness_check::Config;
///
/// let config = Config {
///     api_url: Some("https://api.example.com/prod".into()),
///     api_key: Some("secret".into()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Where the session results and stages are persisted between commands
    pub session_path: PathBuf,

    /// Base URL of the collaborator API (login check and results submission)
    pub api_url: Option<String>,

    /// Customer API key sent with collaborator calls
    pub api_key: Option<String>,

    /// Base URL of the site hosting the speed test fixtures
    pub site_url: Option<String>,

    /// Base URL of the public IP / geolocation service
    pub geo_url: String,

    /// Per-request timeout in seconds for HTTP calls
    pub timeout_seconds: u64,

    /// HTTP User-Agent header value
    pub user_agent: String,

    /// Upper bound on a single latency ping (`None` waits forever)
    pub ping_timeout: Option<Duration>,

    /// How multiple relay hosts of one region are combined
    pub aggregation: AggregationPolicy,

    /// Download fixture size in megabytes
    pub download_size_mb: u64,

    /// Upload payload size in megabytes
    pub upload_size_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            api_url: None,
            api_key: None,
            site_url: None,
            geo_url: DEFAULT_GEO_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ping_timeout: Some(DEFAULT_PING_TIMEOUT),
            aggregation: AggregationPolicy::AnyHost,
            download_size_mb: DOWNLOAD_SIZE_MB,
            upload_size_mb: UPLOAD_SIZE_MB,
        }
    }
}

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Relay connectivity and latency against every region
/// readiness_check network
///
/// # Probe every relay host and keep the fastest
/// readiness_check network --aggregation best-of
///
/// # Speed test against the hosting site
/// readiness_check --api-key KEY --api-url https://api.example.com speed --site-url https://site.example.com
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "readiness_check",
    about = "Checks network readiness: relay connectivity, latency and speed."
)]
pub struct Opt {
    /// Diagnostic to run
    #[command(subcommand)]
    pub command: Command,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Session state file
    #[arg(long, global = true, value_parser, default_value = DEFAULT_SESSION_PATH)]
    pub session_path: PathBuf,

    /// Collaborator API base URL
    #[arg(long, global = true, env = "READINESS_API_URL")]
    pub api_url: Option<String>,

    /// Customer API key
    #[arg(long, global = true, env = "READINESS_API_KEY")]
    pub api_key: Option<String>,

    /// Public IP / geolocation service base URL
    #[arg(long, global = true, default_value = DEFAULT_GEO_URL)]
    pub geo_url: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_seconds: u64,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run relay connectivity and latency tests against every region
    Network {
        /// How multiple relay hosts per region are combined
        #[arg(long, value_enum, default_value_t = AggregationPolicy::AnyHost)]
        aggregation: AggregationPolicy,

        /// Upper bound on one latency ping in milliseconds (0 = unbounded)
        #[arg(long, default_value_t = DEFAULT_PING_TIMEOUT.as_millis() as u64)]
        ping_timeout_ms: u64,
    },
    /// Measure download speed, upload speed and latency
    Speed {
        /// Site hosting the speed test fixtures
        #[arg(long, env = "READINESS_SITE_URL")]
        site_url: String,

        /// Download fixture size in megabytes
        #[arg(long, default_value_t = DOWNLOAD_SIZE_MB)]
        download_size_mb: u64,

        /// Upload payload size in megabytes
        #[arg(long, default_value_t = UPLOAD_SIZE_MB)]
        upload_size_mb: u64,
    },
    /// Submit the collected session results
    Submit,
    /// Clear the stored session
    Reset,
}

impl Opt {
    /// Builds the library configuration from the parsed options.
    pub fn to_config(&self) -> Config {
        let mut config = Config {
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            session_path: self.session_path.clone(),
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            geo_url: self.geo_url.clone(),
            timeout_seconds: self.timeout_seconds,
            ..Default::default()
        };

        match &self.command {
            Command::Network {
                aggregation,
                ping_timeout_ms,
            } => {
                config.aggregation = *aggregation;
                config.ping_timeout = match ping_timeout_ms {
                    0 => None,
                    ms => Some(Duration::from_millis(*ms)),
                };
            }
            Command::Speed {
                site_url,
                download_size_mb,
                upload_size_mb,
            } => {
                config.site_url = Some(site_url.clone());
                config.download_size_mb = *download_size_mb;
                config.upload_size_mb = *upload_size_mb;
            }
            Command::Submit | Command::Reset => {}
        }

        config
    }
}
