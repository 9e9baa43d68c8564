//! Transport abstraction for the search service.
//!
//! The [`Transport`] trait performs exactly one GET per call and reports the
//! raw status and body; status interpretation, decoding, and retries belong
//! to the [`RequestCoordinator`](crate::coordinator::RequestCoordinator).
//!
//! Implementations:
//! - **[`HttpTransport`]**: reqwest client with a per-request timeout.
//! - **[`ScriptedTransport`]**: in-memory, replays scripted responses and
//!   records every request; used by tests and offline demos.

pub mod scripted;

pub use scripted::{Scripted, ScriptedTransport};

use async_trait::async_trait;
use media_search_core::RequestDescriptor;
use reqwest::Url;
use std::time::Duration;

use crate::error::AttemptError;

/// Raw response of one GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single GET. Only connection-level failures are errors;
    /// any HTTP status is returned as a response.
    async fn get(&self, url: &Url) -> Result<TransportResponse, AttemptError>;
}

/// Join the API base URL with a descriptor's path and parameters.
///
/// The base may carry a path prefix (`http://host/api`); the descriptor
/// path is appended to it rather than replacing it.
pub fn request_url(base: &Url, descriptor: &RequestDescriptor) -> Result<Url, String> {
    let joined = format!(
        "{}{}",
        base.as_str().trim_end_matches('/'),
        descriptor.path
    );
    Url::parse_with_params(&joined, descriptor.params.iter().map(|(k, v)| (*k, v.as_str())))
        .map_err(|e| format!("{}: {}", joined, e))
}

/// Transport over HTTP using reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("msearch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AttemptError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Network(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}
