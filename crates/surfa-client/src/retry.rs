//! Retry/backoff controller
//!
//! Every transport outcome is classified into [`Attempt`]. Successes return
//! immediately, fatal failures (401/403, non-retryable 4xx, unclassified
//! transport errors) are raised without retrying, and transient failures
//! (429/5xx from the retry list, timeouts, connection errors) are retried
//! with exponential backoff until the attempt budget runs out.

use crate::config::RetryConfig;
use crate::transport::{IngestRequest, Transport, TransportError, TransportResponse};
use serde_json::Value;
use std::time::Duration;
use surfa_core::{Error, Result, util::truncate_chars};
use tracing::{debug, error, warn};

/// Cap on response text surfaced in errors
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Classified outcome of a single delivery attempt
#[derive(Debug)]
pub enum Attempt {
    Success(TransportResponse),
    Retryable(Error),
    Fatal(Error),
}

/// Classify one transport outcome under the given policy
pub fn classify(
    outcome: std::result::Result<TransportResponse, TransportError>,
    policy: &RetryConfig,
) -> Attempt {
    let response = match outcome {
        Ok(response) => response,
        Err(err @ (TransportError::Timeout(_) | TransportError::Connect(_))) => {
            return Attempt::Retryable(Error::network(err.to_string(), true));
        }
        Err(err @ TransportError::Other(_)) => {
            return Attempt::Fatal(Error::network(err.to_string(), false));
        }
    };

    let status = response.status;
    if (200..300).contains(&status) {
        return Attempt::Success(response);
    }

    if status == 401 || status == 403 {
        return Attempt::Fatal(Error::Auth {
            status_code: status,
            message: with_detail(format!("Authentication failed: {status}"), &response.body),
        });
    }

    let body = truncate_chars(&response.body, MAX_ERROR_BODY_CHARS);

    if policy.is_retryable_status(status) {
        return Attempt::Retryable(Error::Ingest {
            status_code: status,
            message: with_detail(format!("Server error: {status}"), &response.body),
            body,
        });
    }

    let prefix = if (400..500).contains(&status) {
        format!("Client error: {status}")
    } else {
        format!("Server error: {status}")
    };

    Attempt::Fatal(Error::Ingest {
        status_code: status,
        message: with_detail(prefix, &response.body),
        body,
    })
}

/// Append the server's `error` field, if the body carries one
fn with_detail(prefix: String, body: &str) -> String {
    match server_error_detail(body) {
        Some(detail) => format!("{prefix} - {}", truncate_chars(&detail, MAX_ERROR_BODY_CHARS)),
        None => prefix,
    }
}

fn server_error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::Null => None,
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

/// Send a batch, retrying transient failures.
///
/// Each attempt is bounded by `attempt_timeout`; running over counts as a
/// network timeout. Between attempts the caller is suspended for
/// `base_delay * 2^attempt`. After the last attempt the most recent
/// transient error is returned.
pub async fn send_with_retry(
    transport: &dyn Transport,
    request: &IngestRequest,
    policy: &RetryConfig,
    attempt_timeout: Duration,
) -> Result<TransportResponse> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        let outcome = match tokio::time::timeout(attempt_timeout, transport.send(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(format!(
                "no response within {}ms",
                attempt_timeout.as_millis()
            ))),
        };

        match classify(outcome, policy) {
            Attempt::Success(response) => return Ok(response),
            Attempt::Fatal(err) => {
                error!(error = %err, attempt = attempt + 1, "Ingest request failed");
                return Err(err);
            }
            Attempt::Retryable(err) => {
                warn!(
                    error = %err,
                    attempt = attempt + 1,
                    max_attempts,
                    "Retryable ingest failure"
                );

                if attempt + 1 < max_attempts {
                    let delay = policy.delay_for_attempt(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "Retrying ingest request");
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(err);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| Error::network("Failed to flush events after retries", true)))
}
