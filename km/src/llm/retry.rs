//! Retry loop shared by the HTTP clients

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};

use super::LlmError;

/// Maximum number of retries for transient errors
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

/// Backoff before the given attempt (attempt 0 has none)
pub fn backoff_for(attempt: u32) -> Duration {
    if attempt == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1))
    }
}

/// Whether a failed attempt should be tried again
///
/// Rate limits are surfaced at once so the caller sees the retry-after hint.
fn should_retry(error: &LlmError, attempt: u32) -> bool {
    attempt < MAX_RETRIES && !error.is_rate_limit() && error.is_retryable()
}

/// Turn a non-success response into the matching error
async fn error_from_response(response: Response) -> LlmError {
    let status = response.status().as_u16();
    if status == 429 {
        debug!("error_from_response: rate limited (429)");
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        };
    }

    let message = response.text().await.unwrap_or_default();
    LlmError::ApiError { status, message }
}

/// Send a request built by `build`, retrying transient failures
///
/// A 429 is returned immediately as `RateLimited` carrying the server's
/// retry-after hint. Other retryable statuses and network errors are retried
/// with exponential backoff. Returns the successful response.
pub async fn send_with_retry<F>(label: &str, build: F) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    debug!(%label, "send_with_retry: called");
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let backoff = backoff_for(attempt);
            warn!(
                %label,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "send_with_retry: retrying after transient error"
            );
            tokio::time::sleep(backoff).await;
        }

        let error = match build().send().await {
            Ok(response) if response.status().is_success() => {
                debug!("send_with_retry: success");
                return Ok(response);
            }
            Ok(response) => error_from_response(response).await,
            Err(e) => LlmError::Network(e),
        };

        if !should_retry(&error, attempt) {
            debug!(attempt, error = %error, "send_with_retry: giving up");
            return Err(error);
        }
        debug!(attempt, error = %error, "send_with_retry: retryable error");
        attempt += 1;
    }
}
