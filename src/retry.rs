//! JSON-over-HTTP calls with exponential backoff, shared by the embedding
//! and classification providers.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use reqwest::RequestBuilder;
use thiserror::Error;
use tracing::debug;

/// Terminal failure of a retried call.
#[derive(Error, Debug)]
pub enum CallError {
    /// Transport failure on the last attempt.
    #[error("network error: {0}")]
    Network(String),
    /// Non-success status, either non-retryable or the last attempt's.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    /// The success body was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(String),
}

/// Delay before attempt number `attempt` (1-based for retries).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Send the request built by `build` up to `max_retries + 1` times and
/// decode the first successful response as JSON.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed
/// by `send`.
pub async fn send_json_with_retry<F>(
    label: &str,
    max_retries: u32,
    build: F,
) -> Result<serde_json::Value, CallError>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = CallError::Network(format!("{} failed after retries", label));

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            debug!(label, attempt, ?delay, "retrying");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| CallError::Decode(e.to_string()));
                }

                let body = response.text().await.unwrap_or_default();

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = CallError::Api {
                        status: status.as_u16(),
                        body,
                    };
                    continue;
                }

                // Client error (not 429): don't retry
                return Err(CallError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => {
                last_err = CallError::Network(format!("{}: {}", label, e));
                continue;
            }
        }
    }

    Err(last_err)
}
