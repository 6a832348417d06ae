//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a failed operation up to `max_attempts` times in total
//! - Insert the backoff delay between attempts
//! - Surface the last failure once attempts are exhausted
//!
//! # Design Decisions
//! - Every attempt goes through the caller's closure, so a breaker-wrapped
//!   operation re-checks breaker state on each retry
//! - Attempts are strictly sequential
//! - All failure kinds are retryable by default; upstream 4xx can be made
//!   terminal through `retry_client_errors`

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::upstream::UpstreamError;

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per logical request, the first one included. Never below 1.
    pub max_attempts: u32,
    /// Delay inserted after a failed attempt.
    pub backoff: Backoff,
    /// Retry without delay when the previous attempt was rejected by an open breaker.
    pub skip_delay_when_open: bool,
    /// Whether upstream 4xx responses are retried.
    pub retry_client_errors: bool,
}

impl RetryPolicy {
    /// Fixed-delay policy that retries every failure kind.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(delay),
            skip_delay_when_open: false,
            retry_client_errors: true,
        }
    }

    /// Whether `error` may be followed by another attempt.
    pub fn is_retryable(&self, error: &UpstreamError) -> bool {
        match error.upstream_status() {
            Some(status) if status.is_client_error() => self.retry_client_errors,
            _ => true,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32, error: &UpstreamError) -> Duration {
        if self.skip_delay_when_open && error.is_breaker_open() {
            Duration::ZERO
        } else {
            self.backoff.delay(attempt)
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::from(config),
            skip_delay_when_open: config.skip_delay_when_open,
            retry_client_errors: config.retry_client_errors,
        }
    }
}

/// Run `attempt` until it succeeds, a terminal failure occurs, or the policy
/// runs out of attempts.
///
/// `attempt` receives the 1-based attempt number. Exhaustion is reported as
/// [`UpstreamError::RetryExhausted`] wrapping the final attempt's failure and
/// the most recent failure the backend answered itself.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, UpstreamError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt_no = 1;
    let mut reported: Option<UpstreamError> = None;

    loop {
        let error = match attempt(attempt_no).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        tracing::warn!(
            operation,
            attempt = attempt_no,
            max_attempts,
            error = %error,
            "Attempt failed"
        );

        if !policy.is_retryable(&error) {
            return Err(error);
        }
        if let Some(answered) = error.reported_failure() {
            reported = Some(answered.clone());
        }
        if attempt_no >= max_attempts {
            return Err(UpstreamError::RetryExhausted {
                attempts: attempt_no,
                last: Box::new(error),
                reported: reported.map(Box::new),
            });
        }

        let delay = policy.delay_after(attempt_no, &error);
        metrics::record_retry(operation);
        tracing::debug!(operation, attempt = attempt_no, delay = ?delay, "Retrying");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt_no += 1;
    }
}
