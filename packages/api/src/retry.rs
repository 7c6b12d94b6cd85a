//! HTTP retry helpers for transient errors.
//!
//! Every map API request goes through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so connection failures,
//! timeouts, rate limiting and server errors are retried with exponential
//! backoff before surfacing as a layer or catalog error.
//!
//! # Usage
//!
//! ```ignore
//! use crate::retry;
//!
//! let body = retry::send_json(|| client.get(url.clone()), &policy).await?;
//! ```

use std::time::Duration;

use crate::MapApiError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// How many times to attempt a request and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each later attempt.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 1s then 2s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (0-based). Attempt 0 has no
    /// delay.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Hand the response to the caller.
    Accept,
    /// Transient (429 or 5xx); try again if attempts remain.
    Retry,
    /// Permanent client error; give up immediately.
    Fail,
}

/// Classifies a response status.
#[must_use]
pub fn classify_status(status: reqwest::StatusCode) -> StatusAction {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusAction::Retry
    } else if status.is_client_error() {
        StatusAction::Fail
    } else {
        StatusAction::Accept
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// Retries connection errors, timeouts, body read failures, HTTP 429 and
/// HTTP 5xx up to `policy.max_attempts` total attempts. Other 4xx
/// statuses and undecodable JSON bodies fail immediately.
///
/// # Errors
///
/// Returns [`MapApiError`] if every attempt fails, the server returns a
/// non-retryable status, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    build_request: F,
    policy: &RetryPolicy,
) -> Result<serde_json::Value, MapApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error: Option<MapApiError> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.delay_before(attempt);
            log::warn!("  retry {attempt}/{} in {delay:?}...", attempts - 1);
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                if is_transient(&e) && attempt + 1 < attempts {
                    log::warn!("  transient error: {e}");
                    last_error = Some(MapApiError::Http(e));
                    continue;
                }
                return Err(MapApiError::Http(e));
            }
        };

        let url = response.url().to_string();
        let status = response.status();

        match classify_status(status) {
            StatusAction::Accept => {}
            StatusAction::Retry if attempt + 1 < attempts => {
                log::warn!("  HTTP {status} from {url}");
                last_error = Some(MapApiError::Status {
                    status: status.as_u16(),
                    url,
                });
                continue;
            }
            StatusAction::Retry | StatusAction::Fail => {
                return Err(MapApiError::Status {
                    status: status.as_u16(),
                    url,
                });
            }
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                if attempt + 1 < attempts {
                    log::warn!("Response body read failed for {url}: {e}");
                    last_error = Some(MapApiError::Http(e));
                    continue;
                }
                return Err(MapApiError::Http(e));
            }
        };

        return serde_json::from_str(&text).map_err(|e| {
            log::error!(
                "JSON parse failed.\n  \
                 url: {url}\n  \
                 status: {status}\n  \
                 received: {} bytes\n  \
                 parse error: {e}\n  \
                 body preview: {}",
                text.len(),
                preview(&text),
            );
            MapApiError::Json(e)
        });
    }

    Err(last_error.unwrap_or_else(|| MapApiError::InvalidResponse {
        message: "request failed after all retries".to_string(),
    }))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
