use crate::gateway::error::{GatewayError, GatewayResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// HTTP transport for the provider API.
///
/// The provider exposes exactly two call shapes: a signed JSON POST (pay
/// initiation) and a signed GET with a merchant-id header (status read), so
/// those are the only entry points. Transient failures are retried on a
/// doubling backoff schedule, driven by the error taxonomy's own
/// `is_retryable`; rejections and malformed bodies surface immediately.
pub struct GatewayHttpClient {
    client: Client,
    retry_schedule: Vec<Duration>,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> GatewayResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            GatewayError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            client,
            retry_schedule: backoff_schedule(max_retries),
        })
    }

    /// Signed pay-API POST: JSON body plus the `X-VERIFY` checksum header.
    pub async fn post_signed<T: DeserializeOwned>(
        &self,
        url: &str,
        x_verify: &str,
        body: &JsonValue,
    ) -> GatewayResult<T> {
        self.send_with_retries(|| {
            self.client
                .post(url)
                .header("X-VERIFY", x_verify)
                .header("accept", "application/json")
                .json(body)
        })
        .await
    }

    /// Signed status GET: checksum plus the `X-MERCHANT-ID` header the
    /// status endpoint requires.
    pub async fn get_signed<T: DeserializeOwned>(
        &self,
        url: &str,
        x_verify: &str,
        merchant_id: &str,
    ) -> GatewayResult<T> {
        self.send_with_retries(|| {
            self.client
                .get(url)
                .header("X-VERIFY", x_verify)
                .header("X-MERCHANT-ID", merchant_id)
                .header("accept", "application/json")
        })
        .await
    }

    async fn send_with_retries<T, F>(&self, build: F) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut delays = self.retry_schedule.iter();
        loop {
            let error = match self.send_once(build()).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !error.is_retryable() {
                return Err(error);
            }

            let delay = match (&error, delays.next()) {
                // An explicit Retry-After wins over the schedule.
                (
                    GatewayError::RateLimitError {
                        retry_after_seconds: Some(secs),
                        ..
                    },
                    Some(_),
                ) => Duration::from_secs(*secs),
                (_, Some(delay)) => *delay,
                (_, None) => return Err(error),
            };

            warn!(
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "retrying gateway request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError {
                message: format!("gateway request failed: {}", e),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(GatewayError::RateLimitError {
                message: "gateway rate limit exceeded".to_string(),
                retry_after_seconds,
            });
        }

        if !status.is_success() {
            // Keep a bounded slice of the body for server-side diagnostics.
            let snippet: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(512)
                .collect();
            return Err(GatewayError::Rejected {
                code: Some(status.as_u16().to_string()),
                message: format!("gateway answered {}: {}", status.as_u16(), snippet),
                retryable: status.is_server_error(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::MalformedPayload {
                message: format!("invalid gateway JSON response: {}", e),
            })
    }
}

/// Doubling backoff starting at 500 ms, one slot per allowed retry, capped
/// at 8 s.
fn backoff_schedule(max_retries: u32) -> Vec<Duration> {
    (0..max_retries)
        .map(|attempt| Duration::from_millis(500 << attempt.min(4)))
        .collect()
}

/// Constant-time equality for checksum strings.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for i in 0..a.len() {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}
