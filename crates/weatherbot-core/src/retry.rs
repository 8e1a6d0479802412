//! Retry utilities for HTTP operations with exponential backoff.
//!
//! Retried:
//! - Timeouts and connection errors
//! - 5xx server errors
//! - 408 and 429 (honoring `Retry-After`, capped at `max_delay`)
//!
//! Not retried:
//! - Other 4xx client errors, including 401 and 403

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Same backoff as the default, with a different attempt budget
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Calculate the delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // initial_delay * 2^attempt
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// Check if a reqwest error is retryable
pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_timeout() || error.is_connect() {
        return RetryDecision::Retry;
    }

    if error.is_request() || error.is_builder() {
        return RetryDecision::NoRetry;
    }

    if let Some(status) = error.status() {
        return is_retryable_status(status);
    }

    RetryDecision::NoRetry
}

/// Check if a status code is retryable
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        return RetryDecision::Retry;
    }

    RetryDecision::NoRetry
}

/// Seconds from a `Retry-After` header, if present and numeric
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Execute an HTTP request with retry logic.
///
/// `operation` is called once per attempt and must build a fresh request each time.
/// Returns the first non-retryable outcome, or the last outcome once the
/// budget is spent (a retryable status is returned as `Ok` for the caller to map).
///
/// ```ignore
/// let response = with_retry(&RetryConfig::default(), || client.get(url).send()).await?;
/// ```
pub async fn with_retry<F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        let result = operation().await;

        let (decision, hinted_delay) = match &result {
            Ok(response) => (is_retryable_status(response.status()), retry_after(response)),
            Err(e) => (is_retryable_error(e), None),
        };

        if decision == RetryDecision::NoRetry {
            if attempt > 0 && result.is_ok() {
                tracing::info!("Request succeeded after {} retries", attempt);
            }
            return result;
        }

        if attempt >= config.max_retries {
            tracing::error!("All {} attempts exhausted", attempt + 1);
            return result;
        }

        let delay = hinted_delay
            .map(|d| d.min(config.max_delay))
            .unwrap_or_else(|| config.delay_for_attempt(attempt));

        match &result {
            Ok(response) => tracing::warn!(
                "Request returned retryable status {}, attempt {} of {}, waiting {:?}",
                response.status(),
                attempt + 1,
                config.max_retries + 1,
                delay
            ),
            Err(e) => tracing::warn!(
                "Retryable error on attempt {} of {}: {}, waiting {:?}",
                attempt + 1,
                config.max_retries + 1,
                e,
                delay
            ),
        }

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
