//! Retry utilities for forecast requests with exponential backoff.
//!
//! Retried:
//! - 429 Too Many Requests
//! - Timeouts, connection resets, refused connections
//! - Transport errors while reading a 2xx body
//!
//! NOT retried:
//! - Any other HTTP error status (4xx and 5xx alike)
//! - Request construction errors

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use url::Url;

use crate::error::{FetchFailure, WeatherError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Upper bound on how much of an error body we keep.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Per-attempt timeout; an elapsed timeout is retryable
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with `max_attempts` total attempts and a base delay.
    /// Out-of-range values are clamped to 1 attempt / 1 ms.
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms.max(1)),
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Should retry the request
    Retry,
    /// Should not retry - permanent failure
    NoRetry,
}

/// Only rate limiting is worth another attempt; every other error status
/// fails straight away.
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::debug!("Rate limited (429), will retry");
        return RetryDecision::Retry;
    }
    RetryDecision::NoRetry
}

/// Check if a reqwest transport error is retryable
pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_builder() {
        tracing::debug!("Request could not be built, not retryable");
        return RetryDecision::NoRetry;
    }

    if error.is_timeout() {
        tracing::debug!("Request timed out, will retry");
    } else if error.is_connect() {
        tracing::debug!("Connection error, will retry");
    } else {
        tracing::debug!("Transport error, will retry: {}", error);
    }
    RetryDecision::Retry
}

/// Execute an HTTP request with retry logic and return the 2xx body.
///
/// `operation` is called once per attempt. The body of a 2xx response is
/// read inside the attempt, so a timeout or reset while streaming it is
/// retried like a failed send. 429 is retried with backoff; any other
/// status becomes [`WeatherError::Upstream`] without a second attempt.
pub async fn with_retry<F, Fut>(policy: &RetryPolicy, operation: F) -> Result<String, WeatherError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_failure = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    if attempt > 1 {
                        tracing::info!("Request succeeded on attempt {}", attempt);
                    }
                    return Ok(body);
                }
                Err(e) => {
                    tracing::warn!(
                        "Reading response body failed on attempt {} of {}: {}",
                        attempt,
                        max_attempts,
                        e
                    );
                    last_failure = Some(FetchFailure::Network(e.to_string()));
                }
            },
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) == RetryDecision::NoRetry {
                    let body = response.text().await.unwrap_or_default();
                    tracing::warn!("Request failed with non-retryable status {}", status);
                    return Err(WeatherError::Upstream {
                        status: status.as_u16(),
                        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                    });
                }

                tracing::warn!(
                    "Request returned retryable status {}, attempt {} of {}",
                    status,
                    attempt,
                    max_attempts
                );
                last_failure = Some(FetchFailure::Status(status.as_u16()));
            }
            Err(e) => {
                if is_retryable_error(&e) == RetryDecision::NoRetry {
                    return Err(WeatherError::InvalidRequest(e.to_string()));
                }

                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}",
                    attempt,
                    max_attempts,
                    e
                );
                last_failure = Some(FetchFailure::Network(e.to_string()));
            }
        }

        if attempt < max_attempts {
            let delay = policy.delay_after_attempt(attempt);
            tracing::info!("Retry attempt {} of {}, waiting {:?}", attempt + 1, max_attempts, delay);
            tokio::time::sleep(delay).await;
        }
    }

    tracing::error!("All {} attempts exhausted", max_attempts);
    Err(WeatherError::FetchExhausted {
        attempts: max_attempts,
        last: last_failure
            .unwrap_or_else(|| FetchFailure::Network("no attempt was made".to_string())),
    })
}

/// GET `url` with the policy's per-attempt timeout and retry rules,
/// returning the response body. The timeout covers reading the body.
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<String, WeatherError> {
    tracing::debug!("GET {}", url);
    with_retry(policy, || {
        client
            .get(url.clone())
            .timeout(policy.request_timeout)
            .send()
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(8000));
        assert_eq!(policy.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_new_clamps_out_of_range_values() {
        let policy = RetryPolicy::new(0, 0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(1));
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(5, 100);

        // After first failure: 100ms
        assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(100));
        // After second failure: 200ms
        assert_eq!(policy.delay_after_attempt(2), Duration::from_millis(200));
        // After third failure: 400ms
        assert_eq!(policy.delay_after_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new(10, 100).with_max_delay(Duration::from_millis(1000));

        // 100 * 2^4 = 1600 > 1000
        assert_eq!(policy.delay_after_attempt(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_after_attempt(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_only_rate_limiting_is_retryable() {
        assert_eq!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS), RetryDecision::Retry);

        assert_eq!(is_retryable_status(StatusCode::NOT_FOUND), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::BAD_REQUEST), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::REQUEST_TIMEOUT), RetryDecision::NoRetry);
    }
}
