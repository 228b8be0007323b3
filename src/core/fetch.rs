//! Bounded exponential-backoff retries for outbound requests.
//!
//! Cancelling a retry in progress is done by dropping the returned
//! future; the backoff sleep is an await point like any other.

use std::fmt::Display;
use std::future::Future;

use reqwest::{RequestBuilder, Response};
use tokio::time::Instant;

use super::config::RetryPolicy;
use super::error::RelayError;

/// Run `op` until it succeeds or the policy is exhausted, returning the
/// last error unchanged.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt > policy.max_retries {
            tracing::warn!("Giving up after {} attempts: {}", attempt, err);
            return Err(err);
        }

        if let Some(window) = policy.retry_window {
            if started.elapsed() + delay > window {
                tracing::warn!(
                    "Retry window of {:?} exhausted after {} attempts: {}",
                    window,
                    attempt,
                    err
                );
                return Err(err);
            }
        }

        tracing::debug!(
            "Attempt {} failed, retrying in {}ms: {}",
            attempt,
            delay.as_millis(),
            err
        );
        tokio::time::sleep(delay).await;
        delay = delay.saturating_mul(2);
    }
}

async fn send_once(request: RequestBuilder) -> Result<Response, String> {
    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("HTTP {}: {}", status, body.trim()))
}

/// Send the request built by `build` with retries. Transport errors and
/// non-success statuses both count as failed attempts.
pub async fn fetch_with_retry<F>(
    service: &'static str,
    policy: &RetryPolicy,
    build: F,
) -> Result<Response, RelayError>
where
    F: Fn() -> RequestBuilder,
{
    let attempt = || send_once(build());

    retry(policy, attempt)
        .await
        .map_err(|reason| RelayError::UpstreamConnection { service, reason })
}
