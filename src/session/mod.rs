//! Session results and stage state.
//!
//! This module provides:
//! - [`SessionResults`]: the flat key/value accumulator every diagnostic writes into
//! - [`Stages`]: the readiness-check stage tracker
//! - [`SessionStore`]: persistence of both between CLI invocations
//! - Sanitization of values before submission

mod sanitize;
mod stages;
mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use sanitize::sanitize_field;
pub use stages::{Stage, StageFlags, Stages};
pub use store::SessionStore;

/// Session field recording whether the network tests have finished.
pub const NETWORK_TESTS_RUN_FIELD: &str = "networkTestsRun";

/// Keys never included in a submission.
const EXCLUDED_FIELDS: [&str; 2] = ["objects", "apiKey"];

/// Result of the collaborator login check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResult {
    pub success: bool,
    #[serde(rename = "uploadUrl", default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

impl LoginResult {
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Structured detail kept with the session but never submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Geolocation payload, or an error string when the lookup failed
    #[serde(rename = "geoIP", default, skip_serializing_if = "Option::is_none")]
    pub geo_ip: Option<serde_json::Value>,
    #[serde(rename = "loginResults", default, skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginResult>,
}

/// Flat string fields plus the API key and the structured detail object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(default)]
    objects: DeviceDetail,
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
}

impl SessionResults {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Sets a flat field. `objects` and `apiKey` are reserved and ignored here.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if EXCLUDED_FIELDS.contains(&key.as_str()) {
            log::warn!("Ignoring write to reserved session field {}", key);
            return;
        }
        self.fields.insert(key, value.into());
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    pub fn objects(&self) -> &DeviceDetail {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut DeviceDetail {
        &mut self.objects
    }

    /// Every flat field, sanitized, as sent to the collaborator API.
    pub fn submission_body(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|(key, _)| !EXCLUDED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), sanitize_field(value)))
            .collect()
    }
}

/// Everything persisted for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub results: SessionResults,
    pub stages: Stages,
}
