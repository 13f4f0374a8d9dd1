//! Control endpoint client boundary.
//!
//! The detector exposes its control API over HTTP. Everything above this
//! module talks to the device through the [`EndpointClient`] trait so the
//! probe, the telemetry refresh, and the acquisition controller can all be
//! tested against a scripted in-memory endpoint (see [`crate::mock`]).
//!
//! Calls are awaited inline on the dispatch path: a slow round trip stalls
//! later writes until it resolves. Every request is bounded by the client
//! timeout, and expiry surfaces as a failed action rather than a hang.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Success status code for the control API.
pub const STATUS_OK: u16 = 200;

/// Response from one control-endpoint request.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl EndpointResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// One synchronous-in-effect request against the detector's control API.
///
/// Implementations must be safe to call repeatedly; the driver serializes
/// calls itself, so no internal locking is required.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    /// Issue a GET against a sub-path of the endpoint (e.g. `/dashboard`).
    async fn get(&self, path: &str) -> Result<EndpointResponse>;
}

// =============================================================================
// Command vocabulary
// =============================================================================

/// Device-specific sub-paths of the control API.
///
/// The exact request shapes for "begin acquisition" and "end acquisition"
/// vary per camera model, so they are plain data here; the default is the
/// Timepix control-server layout.
#[derive(Debug, Clone)]
pub struct CommandVocabulary {
    /// Identity/telemetry query.
    pub dashboard: String,
    /// Begin-acquisition command.
    pub begin_acquisition: String,
    /// End-acquisition command.
    pub end_acquisition: String,
}

impl Default for CommandVocabulary {
    fn default() -> Self {
        Self {
            dashboard: "/dashboard".to_string(),
            begin_acquisition: "/measurement/start".to_string(),
            end_acquisition: "/measurement/stop".to_string(),
        }
    }
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// Basic-auth credentials for controllers that require them.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

/// [`EndpointClient`] backed by `reqwest`.
pub struct HttpEndpoint {
    base_url: String,
    client: reqwest::Client,
    auth: Option<BasicAuth>,
}

impl HttpEndpoint {
    /// Default bound on a single control round trip.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, Self::DEFAULT_TIMEOUT, None)
    }

    pub fn with_options(
        base_url: impl Into<String>,
        timeout: Duration,
        auth: Option<BasicAuth>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("det-driver-timepix/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            auth,
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.is_empty() || path == "/" {
            self.base_url.clone()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl EndpointClient for HttpEndpoint {
    async fn get(&self, path: &str) -> Result<EndpointResponse> {
        let url = self.url_for(path);
        let mut request = self.client.get(&url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading body of GET {}", url))?;

        Ok(EndpointResponse {
            status,
            headers,
            body,
        })
    }
}
