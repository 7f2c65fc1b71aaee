//! HTTP transport for ARM REST API calls
//!
//! Sends one logical request, retrying transient failures (throttling,
//! gateway and server errors) with exponential backoff.

use super::error::ApiError;
use crate::config::RetrySettings;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("tfarm/", env!("CARGO_PKG_VERSION"));

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", cut, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Which responses are retried, and how long to wait between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.base_delay(),
            max_delay: settings.max_delay(),
        }
    }

    pub fn should_retry(status: u16) -> bool {
        matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
    }

    /// Delay before retry number `attempt` (0-based); a server-supplied `Retry-After` wins
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let computed = retry_after.unwrap_or_else(|| {
            self.base_delay
                .saturating_mul(2u32.saturating_pow(attempt))
        });
        computed.min(self.max_delay)
    }
}

/// Parse `Retry-After` given in seconds
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// A decoded ARM response
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// `Value::Null` when the body was empty
    pub body: Value,
}

impl ArmResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One request to send; `query` is appended to `url`
#[derive(Debug, Clone)]
pub struct ArmRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub query: Vec<(&'a str, &'a str)>,
    pub body: Option<&'a Value>,
}

impl<'a> ArmRequest<'a> {
    pub fn new(method: Method, url: &'a str) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &'a str, value: &'a str) -> Self {
        self.query.push((key, value));
        self
    }

    pub fn body(mut self, body: &'a Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP client wrapper for ARM API calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl ArmHttpClient {
    pub fn new(settings: &RetrySettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    /// Send a request with the bearer token, retrying transient failures
    pub async fn send(&self, request: &ArmRequest<'_>, token: &str) -> Result<ArmResponse, ApiError> {
        let mut attempt = 0;

        loop {
            tracing::debug!("{} {} (attempt {})", request.method, request.url, attempt + 1);

            let mut builder = self
                .client
                .request(request.method.clone(), request.url)
                .bearer_auth(token)
                .header("x-ms-client-request-id", uuid::Uuid::new_v4().to_string());

            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = request.body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt, None);
                    tracing::warn!(
                        "{} {} failed: {} - retrying in {:?}",
                        request.method,
                        request.url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                },
                Err(e) => return Err(ApiError::Transport(e)),
            };

            let status = response.status().as_u16();
            let headers = response.headers().clone();

            if RetryPolicy::should_retry(status) && attempt < self.retry.max_retries {
                let delay = self.retry.delay(attempt, retry_after(&headers));
                tracing::warn!(
                    "{} {} -> {} - retrying in {:?}",
                    request.method,
                    request.url,
                    status,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let text = response.text().await?;

            if !(200..300).contains(&status) {
                // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
                if status == 404 {
                    tracing::debug!("{} {} -> 404", request.method, request.url);
                } else {
                    tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
                }
                return Err(ApiError::from_response(status, &text));
            }

            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text)?
            };

            return Ok(ArmResponse {
                status,
                headers,
                body,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_should_retry() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(RetryPolicy::should_retry(status), "{status}");
        }
        for status in [200, 201, 400, 401, 403, 404, 409, 501] {
            assert!(!RetryPolicy::should_retry(status), "{status}");
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.delay(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay(1, None), Duration::from_millis(200));
        assert_eq!(policy.delay(3, None), Duration::from_millis(800));
        assert_eq!(policy.delay(10, None), Duration::from_secs(2));
    }

    #[test]
    fn test_retry_after_wins_but_is_capped() {
        let policy = policy();
        assert_eq!(policy.delay(0, Some(Duration::from_secs(1))), Duration::from_secs(1));
        assert_eq!(policy.delay(0, Some(Duration::from_secs(30))), Duration::from_secs(2));
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_sanitize_for_log() {
        assert_eq!(sanitize_for_log("line1\nline2"), "line1line2");
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("[truncated, 500 bytes total]"));
    }
}
