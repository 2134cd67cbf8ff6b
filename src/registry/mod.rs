//! Endpoint registry.
//!
//! The static table of regional diagnostic targets. Each region has an HTTP
//! endpoint used for latency pings and one or more relay hosts used for
//! connectivity probing. The registry is built once and never mutated; callers
//! that need a private working copy use [`Registry::clone`].

use serde::Serialize;

use crate::config::{RELAY_CREDENTIAL, RELAY_USERNAME, TURN_PORT};
use crate::error_handling::RegistryError;

/// One diagnostic target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionTarget {
    region_id: String,
    display_name: String,
    http_endpoint: String,
    relay_hosts: Vec<String>,
}

impl RegionTarget {
    /// Creates a region target.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::EmptyRegionId` if `region_id` is blank and
    /// `RegistryError::NoRelayHosts` if `relay_hosts` is empty.
    pub fn new<I, S>(
        region_id: impl Into<String>,
        display_name: impl Into<String>,
        http_endpoint: impl Into<String>,
        relay_hosts: I,
    ) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let region_id = region_id.into();
        if region_id.trim().is_empty() {
            return Err(RegistryError::EmptyRegionId);
        }
        let relay_hosts: Vec<String> = relay_hosts.into_iter().map(Into::into).collect();
        if relay_hosts.is_empty() {
            return Err(RegistryError::NoRelayHosts(region_id));
        }
        Ok(Self {
            region_id,
            display_name: display_name.into(),
            http_endpoint: http_endpoint.into(),
            relay_hosts,
        })
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn http_endpoint(&self) -> &str {
        &self.http_endpoint
    }

    /// Relay hosts in declaration order; never empty.
    pub fn relay_hosts(&self) -> &[String] {
        &self.relay_hosts
    }

    /// URL of the latency ping for this region.
    ///
    /// The endpoint carries its own trailing slash, so the path is appended
    /// verbatim.
    pub fn ping_url(&self, token: &str) -> String {
        format!("{}ping?x={}", self.http_endpoint, token)
    }

    /// ICE server description covering every relay host of this region.
    pub fn ice_server(&self) -> IceServer {
        IceServer::for_relay_hosts(&self.relay_hosts)
    }
}

/// Relay-only ICE server description handed to a negotiation session.
///
/// The credentials are placeholders: the probe only needs the relay to answer
/// with an authentication challenge, never a completed allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl IceServer {
    /// Builds `turn:<host>:3478` URLs for each host with placeholder credentials.
    pub fn for_relay_hosts<S: AsRef<str>>(hosts: &[S]) -> Self {
        Self {
            urls: hosts
                .iter()
                .map(|h| format!("turn:{}:{}", h.as_ref(), TURN_PORT))
                .collect(),
            username: RELAY_USERNAME.to_string(),
            credential: RELAY_CREDENTIAL.to_string(),
        }
    }
}

/// Ordered, immutable collection of region targets with unique ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    targets: Vec<RegionTarget>,
}

impl Registry {
    /// Creates a registry from targets in probe order.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateRegion` if two targets share an id.
    pub fn new(targets: Vec<RegionTarget>) -> Result<Self, RegistryError> {
        for (i, target) in targets.iter().enumerate() {
            if targets[..i]
                .iter()
                .any(|t| t.region_id == target.region_id)
            {
                return Err(RegistryError::DuplicateRegion(target.region_id.clone()));
            }
        }
        Ok(Self { targets })
    }

    /// The built-in table of regional endpoints.
    pub fn default_regions() -> Self {
        let targets = DEFAULT_REGIONS
            .iter()
            .map(|(id, name, endpoint, hosts)| RegionTarget {
                region_id: (*id).to_string(),
                display_name: (*name).to_string(),
                http_endpoint: (*endpoint).to_string(),
                relay_hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
            })
            .collect();
        Self { targets }
    }

    pub fn targets(&self) -> &[RegionTarget] {
        &self.targets
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegionTarget> {
        self.targets.iter()
    }

    /// Looks a region up by id.
    pub fn get(&self, region_id: &str) -> Option<&RegionTarget> {
        self.targets.iter().find(|t| t.region_id == region_id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::default_regions()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a RegionTarget;
    type IntoIter = std::slice::Iter<'a, RegionTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

type RegionRow = (&'static str, &'static str, &'static str, &'static [&'static str]);

const DEFAULT_REGIONS: &[RegionRow] = &[
    (
        "us-east-1",
        "Virginia",
        "https://rtc.connect-telecom.us-east-1.amazonaws.com/",
        &["TurnNlb-d76454ac48d20c1e.elb.us-east-1.amazonaws.com"],
    ),
    (
        "us-west-2",
        "Oregon",
        "https://rtc.connect-telecom.us-west-2.amazonaws.com/",
        &[
            "TurnNlb-8d79b4466d82ad0e.elb.us-west-2.amazonaws.com",
            "TurnNlb-dbc4ebb71307fda2.elb.us-west-2.amazonaws.com",
        ],
    ),
    (
        "eu-central-1",
        "Frankfurt",
        "https://rtc.connect-telecom.eu-central-1.amazonaws.com/",
        &["TurnNlb-ea5316ebe2759cbc.elb.eu-central-1.amazonaws.com"],
    ),
    (
        "ap-southeast-2",
        "Sydney",
        "https://rtc.connect-telecom.ap-southeast-2.amazonaws.com/",
        &["TurnNlb-93f2de0c97c4316b.elb.ap-southeast-2.amazonaws.com"],
    ),
    (
        "ap-northeast-1",
        "Tokyo",
        "https://rtc.connect-telecom.ap-northeast-1.amazonaws.com/",
        &["TurnNlb-3c6ddabcbeb821d8.elb.ap-northeast-1.amazonaws.com"],
    ),
    (
        "ap-southeast-1",
        "Singapore",
        "https://rtc.cell-1.prod.ap-southeast-1.prod.connect.aws.a2z.com/",
        &["TurnNlb-261982506d86d300.elb.ap-southeast-1.amazonaws.com"],
    ),
    (
        "eu-west-2",
        "London",
        "https://rtc.cell-1.prod.eu-west-2.prod.connect.aws.a2z.com/",
        &["TurnNlb-1dc64a459ead57ea.elb.eu-west-2.amazonaws.com"],
    ),
];
