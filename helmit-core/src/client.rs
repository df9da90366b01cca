//! HTTP client for the Helmit backend
//!
//! Every request carries a timeout. Responses are read fully, checked for a
//! success status, then deserialized into the typed wire structs; anything
//! that does not fit is rejected as a parse error.

use crate::api::{
    ForecastResponse, PredictRequest, PredictResponse, PrivacyFinding, PrivacyRequest,
    StatsSnapshot,
};
use crate::classify::RiskSummary;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default backend location
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Predict,
    Forecast,
    Stats,
    Privacy,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Endpoint::Predict => "predict",
            Endpoint::Forecast => "forecast",
            Endpoint::Stats => "stats",
            Endpoint::Privacy => "privacy",
        })
    }
}

/// Which family of routes the backend exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointLayout {
    /// `/api/predict`, `/api/forecast`, `/api/stats`, `/api/privacy/check`
    #[default]
    Api,
    /// `/predict`, `/forecast`, `/api/stats`, `/privacy/scan`
    Legacy,
}

impl EndpointLayout {
    pub fn path(&self, endpoint: Endpoint) -> &'static str {
        match (self, endpoint) {
            (EndpointLayout::Api, Endpoint::Predict) => "/api/predict",
            (EndpointLayout::Api, Endpoint::Forecast) => "/api/forecast",
            (EndpointLayout::Api, Endpoint::Privacy) => "/api/privacy/check",
            (EndpointLayout::Legacy, Endpoint::Predict) => "/predict",
            (EndpointLayout::Legacy, Endpoint::Forecast) => "/forecast",
            (EndpointLayout::Legacy, Endpoint::Privacy) => "/privacy/scan",
            (_, Endpoint::Stats) => "/api/stats",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointLayout::Api => "api",
            EndpointLayout::Legacy => "legacy",
        }
    }
}

/// Failure of a single backend request
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request did not complete (connection refused, timeout, reset)
    #[error("{endpoint} request failed: {source}")]
    Network {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-2xx status
    #[error("{endpoint} returned HTTP {status}")]
    Http {
        endpoint: Endpoint,
        status: u16,
        body: String,
    },

    /// The body was not the JSON shape we expect
    #[error("malformed {endpoint} response: {source}")]
    Parse {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Network { source, .. } if source.is_timeout())
    }
}

/// Connection settings for [`RiskClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub layout: EndpointLayout,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            base_url: DEFAULT_BASE_URL.to_string(),
            layout: EndpointLayout::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Thin async wrapper over the backend REST endpoints
#[derive(Debug, Clone)]
pub struct RiskClient {
    http: Client,
    base_url: String,
    layout: EndpointLayout,
}

impl RiskClient {
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(RiskClient {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            layout: options.layout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, self.layout.path(endpoint))
    }

    /// `POST /predict` with a single user message
    pub async fn predict(&self, text: &str) -> Result<PredictResponse, ClientError> {
        let request = self
            .http
            .post(self.url(Endpoint::Predict))
            .json(&PredictRequest::single(text));
        self.send(Endpoint::Predict, request).await
    }

    /// Classify one message and normalize the result
    pub async fn classify(&self, text: &str) -> Result<RiskSummary, ClientError> {
        let response = self.predict(text).await?;
        Ok(RiskSummary::from_response(response))
    }

    /// `GET /forecast?days=N`
    pub async fn forecast(&self, days: u32) -> Result<ForecastResponse, ClientError> {
        let request = self
            .http
            .get(self.url(Endpoint::Forecast))
            .query(&[("days", days)]);
        self.send(Endpoint::Forecast, request).await
    }

    /// `GET /api/stats`
    pub async fn stats(&self) -> Result<StatsSnapshot, ClientError> {
        let request = self.http.get(self.url(Endpoint::Stats));
        self.send(Endpoint::Stats, request).await
    }

    /// `POST /privacy/check`
    pub async fn check_privacy(&self, text: &str) -> Result<PrivacyFinding, ClientError> {
        let request = self
            .http
            .post(self.url(Endpoint::Privacy))
            .json(&PrivacyRequest {
                text: text.to_string(),
            });
        self.send(Endpoint::Privacy, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        tracing::debug!(%endpoint, "sending request");

        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Network { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%endpoint, status = status.as_u16(), "backend returned an error status");
            return Err(ClientError::Http {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Network { endpoint, source })?;

        serde_json::from_slice(&bytes).map_err(|source| {
            tracing::warn!(%endpoint, "could not parse response body: {}", source);
            ClientError::Parse { endpoint, source }
        })
    }
}
