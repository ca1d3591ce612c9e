//! Shared HTTP plumbing for the REST adapters.
//!
//! Sends requests with a hard timeout and turns HTTP failures into the
//! classified [`SyncError`] the engine works with:
//!
//! | response        | error                          |
//! |-----------------|--------------------------------|
//! | 404             | `NotFound`                     |
//! | 429             | `RateLimited` (+ `Retry-After`) |
//! | 401             | `Unauthorized`                 |
//! | other 4xx       | `Rejected`                     |
//! | 5xx             | `ServerUnavailable`            |
//! | timeout, transport, bad body | `Remote`          |

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use restock_domain::RemoteSystem;
use restock_exec::SyncError;

// =============================================================================
// Constants
// =============================================================================

/// Request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Longest response body excerpt carried in error messages
const MAX_BODY_EXCERPT: usize = 200;

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur while talking HTTP.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String, retry_after: Option<Duration> },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Classify for the engine.
    pub fn classify(self, system: RemoteSystem) -> SyncError {
        match self {
            HttpError::Status { status, body, retry_after } => match status {
                404 => SyncError::not_found(system, body),
                429 => SyncError::rate_limited(system, format!("HTTP 429: {}", body), retry_after),
                401 => SyncError::Unauthorized { system, message: body },
                500..=599 => SyncError::unavailable(system, format!("HTTP {}: {}", status, body)),
                _ => SyncError::Rejected { system, message: format!("HTTP {}: {}", status, body) },
            },
            HttpError::InvalidUrl(message) => SyncError::Config(message),
            other => SyncError::remote(system, other.to_string()),
        }
    }
}

/// Parse a `Retry-After` value given in seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

// =============================================================================
// REST Client
// =============================================================================

/// Thin reqwest wrapper bound to one remote system and base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
    system: RemoteSystem,
}

impl RestClient {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// `SyncError::Config` when the base URL does not parse.
    pub fn new(system: RemoteSystem, base_url: &str) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("Invalid {} base URL '{}': {}", system, base_url, e)))?;
        Ok(Self { client: Client::new(), base_url, system })
    }

    /// Remote system this client talks to.
    pub fn system(&self) -> RemoteSystem {
        self.system
    }

    /// Build an endpoint URL, percent-encoding each path segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, HttpError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HttpError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Underlying HTTP client.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Send a request and return the body of a successful response.
    pub async fn send(&self, request: RequestBuilder) -> Result<String, HttpError> {
        let response = timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), request.send())
            .await
            .map_err(|_| HttpError::Timeout)?
            .map_err(|e| HttpError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after)
        } else {
            None
        };
        let body = response.text().await.map_err(|e| HttpError::ParseError(e.to_string()))?;

        if !status.is_success() {
            debug!(system = %self.system, status = status.as_u16(), "Request failed");
            return Err(HttpError::Status { status: status.as_u16(), body: excerpt(&body), retry_after });
        }

        Ok(body)
    }

    /// Send a request and decode a JSON body, classifying any failure.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SyncError> {
        let body = self.send(request).await.map_err(|e| e.classify(self.system))?;
        parse_json(&body).map_err(|e| e.classify(self.system))
    }
}

/// Decode a JSON body.
pub fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, HttpError> {
    serde_json::from_str(body).map_err(|e| HttpError::ParseError(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
