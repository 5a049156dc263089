//! Thin reqwest wrapper for the game statistics API under test.

use crate::engine::outcome::BoxError;
use pacer_common::TargetConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid base url '{0}': expected an http:// or https:// url")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("availability probe to {url} failed: {source}")]
    ProbeTransport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("availability probe to {url} returned {status}, expected 200 OK")]
    ProbeStatus { url: String, status: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// What the suites keep from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOutcome {
    pub status: u16,
    /// Media type without parameters, lower-cased (`application/json`).
    pub content_type: Option<String>,
    pub body: String,
}

/// Strips parameters from a `Content-Type` value.
pub fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    probe_path: String,
}

impl ApiClient {
    pub fn new(config: &TargetConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(config.base_url.clone()));
        }

        let mut builder = Client::builder().danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(ms) = config.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let http = builder.build().map_err(ApiError::Build)?;

        debug!(
            base_url = %base_url,
            accept_invalid_certs = config.accept_invalid_certs,
            "API client ready"
        );
        Ok(Self {
            http,
            base_url,
            probe_path: config.probe_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Checks the API is reachable before any load is fired at it.
    pub async fn probe(&self) -> Result<(), ApiError> {
        let url = self.url(&self.probe_path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::ProbeTransport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(url = %url, status = status.as_u16(), "API availability probe failed");
            return Err(ApiError::ProbeStatus {
                url,
                status: status.as_u16(),
            });
        }
        info!(url = %url, "API is available");
        Ok(())
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<HttpOutcome, reqwest::Error> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(media_type);
        let body = response.text().await?;

        Ok(HttpOutcome {
            status,
            content_type,
            body,
        })
    }

    /// Like [`ApiClient::execute`], but gives up as soon as `cancel` fires.
    pub async fn send(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpOutcome, BoxError> {
        tokio::select! {
            res = self.execute(request) => res.map_err(|e| Box::new(e) as BoxError),
            _ = cancel.cancelled() => Err("request cancelled".into()),
        }
    }
}
