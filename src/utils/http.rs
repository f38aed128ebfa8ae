// src/utils/http.rs

//! HTTP client utilities.
//!
//! [`Transport`] is the only way the harvester touches the network for
//! reading. [`HttpTransport`] is the reqwest implementation; it classifies
//! failures and retries the transient ones with exponential backoff.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{FetchError, Result};
use crate::models::{RetryConfig, SruConfig};

/// Fetch a URL and return the response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_ms),
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or attempts run out.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> std::result::Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, FetchError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    what,
                    e,
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Statuses worth repeating.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

/// Map a reqwest error onto the fetch taxonomy.
pub fn classify(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_connect() {
        return FetchError::transient(error);
    }
    if let Some(status) = error.status() {
        if is_transient_status(status) {
            return FetchError::transient(error);
        }
    }
    // Body read interrupted mid-stream
    if error.is_body() || error.is_decode() {
        return FetchError::transient(error);
    }
    FetchError::fatal(error)
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &SruConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// reqwest-backed [`Transport`] with retry.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Build a transport from the SRU and retry sections of the config.
    pub fn from_config(sru: &SruConfig, retry: &RetryConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(sru)?, RetryPolicy::from(retry)))
    }

    async fn get_once(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {} for {}", status, url);
            return Err(if is_transient_status(status) {
                FetchError::transient(message)
            } else {
                FetchError::fatal(message)
            });
        }

        let bytes = response.bytes().await.map_err(|e| classify(&e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        log::debug!("GET {}", url);
        with_retry(self.policy, url, || self.get_once(url)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(instant(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(FetchError::transient("HTTP 503"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = with_retry(instant(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::transient("timeout")) }
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = with_retry(instant(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::fatal("HTTP 404")) }
        })
        .await;

        assert!(!result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
