//! Resilient fetch: cache → timeout → bounded retry → validation.
//!
//! Only transport-level failures are retried. A timeout fails immediately
//! with `NetworkFailure::Timeout`, and any non-2xx status fails immediately
//! with `ZigmaError::Api`. Responses are decoded into the caller's payload
//! type; a shape mismatch is a `Validation` error and is never cached.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{RawResponse, Transport};
use crate::cache::ResponseCache;
use crate::config::ApiConfig;
use crate::types::{NetworkFailure, ZigmaError, ZigmaResult};

/// Exponential backoff schedule: `base_delay * 2^attempt`, attempt from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ApiConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: cfg.retry_delay(),
        }
    }

    /// Delay before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// The full delay schedule if every retry is used.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|a| self.delay_for(a)).collect()
    }
}

/// Decode a JSON value into the expected payload type.
pub fn decode<T: DeserializeOwned>(url: &str, value: Value) -> ZigmaResult<T> {
    serde_json::from_value(value).map_err(|e| {
        error!(url, detail = %e, "Response validation failed");
        ZigmaError::Validation {
            url: url.to_string(),
            detail: e.to_string(),
        }
    })
}

/// Oracle fetch layer shared by every command and the heartbeat.
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    cache: ResponseCache<Value>,
    policy: RetryPolicy,
    timeout: Duration,
    api_key: Option<SecretString>,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn Transport>, cfg: &ApiConfig, api_key: Option<&str>) -> Self {
        Self {
            transport,
            cache: ResponseCache::new(cfg.cache_ttl()),
            policy: RetryPolicy::from_config(cfg),
            timeout: cfg.timeout(),
            api_key: api_key.map(|k| SecretString::new(k.to_string())),
        }
    }

    pub fn cache(&self) -> &ResponseCache<Value> {
        &self.cache
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `url` and decode it as `T`.
    ///
    /// A live cache entry short-circuits everything, including the timeout
    /// and retry logic.
    pub async fn fetch<T: DeserializeOwned>(&self, url: &str, use_cache: bool) -> ZigmaResult<T> {
        if use_cache {
            if let Some(cached) = self.cache.get(url) {
                debug!(url, "Cache hit");
                return decode(url, cached);
            }
        }

        debug!(url, "Fetching from API");
        let response = self.send_with_retry(url).await?;

        let value: Value = serde_json::from_str(&response.body).map_err(|e| {
            error!(url, detail = %e, "Response body is not valid JSON");
            ZigmaError::Validation {
                url: url.to_string(),
                detail: format!("invalid JSON: {e}"),
            }
        })?;

        let data = decode(url, value.clone())?;

        if use_cache {
            self.cache.insert(url, value);
        }
        Ok(data)
    }

    async fn send_with_retry(&self, url: &str) -> ZigmaResult<RawResponse> {
        let bearer = self.api_key.as_ref().map(|k| k.expose_secret().as_str());
        let mut attempt = 0u32;

        loop {
            let outcome = tokio::time::timeout(self.timeout, self.transport.get(url, bearer)).await;

            match outcome {
                Err(_elapsed) => {
                    warn!(url, timeout_ms = self.timeout.as_millis() as u64, "Request timeout");
                    return Err(ZigmaError::Network {
                        url: url.to_string(),
                        failure: NetworkFailure::Timeout {
                            after_ms: self.timeout.as_millis() as u64,
                        },
                    });
                }
                Ok(Ok(resp)) if resp.is_success() => return Ok(resp),
                Ok(Ok(resp)) => {
                    warn!(url, status = resp.status, "API returned error status");
                    return Err(ZigmaError::Api {
                        url: url.to_string(),
                        status: resp.status,
                    });
                }
                Ok(Err(e)) => {
                    if attempt >= self.policy.max_retries {
                        warn!(url, attempts = attempt + 1, error = %e, "Retries exhausted");
                        return Err(ZigmaError::Network {
                            url: url.to_string(),
                            failure: NetworkFailure::Transport(e.0),
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        url,
                        retries_left = self.policy.max_retries - attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
