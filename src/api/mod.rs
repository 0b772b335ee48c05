//! Oracle API access.
//!
//! Defines the `Transport` trait (one HTTP GET, no policy), the resilient
//! fetch layer that adds timeout, retry, caching and response validation on
//! top of it, and the typed `ZigmaClient` endpoints used by the commands.

pub mod client;
pub mod fetch;

use async_trait::async_trait;
use reqwest::Client;
use std::fmt;

pub use client::{SignalQuery, ZigmaClient};
pub use fetch::{ResilientFetcher, RetryPolicy};

/// An HTTP response as seen by the fetch layer.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced a response (connection reset, DNS, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

/// Minimal HTTP seam under the fetch layer.
///
/// Implementors perform exactly one attempt and report any HTTP status as
/// `Ok`; only transport-level failures are `Err`. Timeouts and retries are
/// applied by [`ResilientFetcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = Client::builder()
            .user_agent("ZIGMA/0.1.0 (prediction-market-skill)")
            .build()
            .context("Failed to build HTTP client for the oracle API")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<RawResponse, TransportError> {
        let mut req = self
            .http
            .get(url)
            .header("Content-Type", "application/json");
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError(format!("failed to read body: {e}")))?;

        Ok(RawResponse { status, body })
    }
}
