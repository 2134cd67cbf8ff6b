//! Collaborator HTTP calls.
//!
//! The diagnostics engine depends on two calls to the readiness-check API
//! (login check, results submission) and on a public IP / geolocation
//! service used to fill in the session details.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Deserialize;
use url::Url;

use crate::config::{API_KEY_HEADER, UNKNOWN_IP};
use crate::error_handling::ApiError;
use crate::session::{LoginResult, SessionResults};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "uploadUrl")]
    upload_url: Option<String>,
}

/// Client for the readiness-check API.
#[derive(Clone)]
pub struct ApiClient {
    client: Arc<reqwest::Client>,
    base: String,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if `api_url` is not an absolute URL.
    pub fn new(client: Arc<reqwest::Client>, api_url: &str) -> Result<Self, ApiError> {
        Url::parse(api_url)?;
        Ok(Self {
            client,
            base: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(Url::parse(&format!("{}/{}", self.base, path))?)
    }

    /// Verifies the API key and fetches a fresh signed upload URL.
    ///
    /// Never fails: any error is logged and reported as `success: false`.
    pub async fn check_login(&self, api_key: &str) -> LoginResult {
        match self.try_login(api_key).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to verify login: {}", e);
                LoginResult::failed()
            }
        }
    }

    async fn try_login(&self, api_key: &str) -> Result<LoginResult, ApiError> {
        let response: LoginResponse = self
            .client
            .get(self.endpoint("login")?)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Login check succeeded");
        Ok(LoginResult {
            success: true,
            upload_url: response.upload_url,
        })
    }

    /// Posts the sanitized session fields.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingApiKey` if the session has no API key, or the
    /// transport / status error of the request.
    pub async fn submit_results(&self, results: &SessionResults) -> Result<(), ApiError> {
        let api_key = results.api_key().ok_or(ApiError::MissingApiKey)?;
        let body = results.submission_body();
        debug!(
            "Sending data to the server: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        self.client
            .post(self.endpoint("data")?)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        info!("Submitted {} result fields", body.len());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Public IP and geolocation lookups.
#[derive(Clone)]
pub struct GeoClient {
    client: Arc<reqwest::Client>,
    base: Url,
}

impl GeoClient {
    pub fn new(client: Arc<reqwest::Client>, geo_url: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(geo_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    /// The caller's public IP, or `unknown` if the lookup fails.
    pub async fn public_ip(&self) -> String {
        let lookup = async {
            let response: IpResponse = self
                .client
                .get(self.base.join("ip.json")?)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok::<_, ApiError>(response.ip)
        };
        match lookup.await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Public IP lookup failed: {}", e);
                UNKNOWN_IP.to_string()
            }
        }
    }

    /// Geolocation data for `ip`; the error message as a string if the lookup fails.
    pub async fn geo_data(&self, ip: &str) -> serde_json::Value {
        let lookup = async {
            let value: serde_json::Value = self
                .client
                .get(self.base.join(&format!("ip/geo/{}.json", ip))?)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok::<_, ApiError>(value)
        };
        match lookup.await {
            Ok(value) => value,
            Err(e) => {
                warn!("Geolocation lookup for {} failed: {}", ip, e);
                serde_json::Value::String(format!("Error: {}", e))
            }
        }
    }
}
