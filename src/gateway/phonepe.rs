use crate::gateway::checksum;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::provider::PaymentGateway;
use crate::gateway::types::{
    DecodedCallback, GatewayEnvironment, GatewayStatus, PayPageRedirect, PayPageRequest,
    PaymentStatus,
};
use crate::gateway::utils::GatewayHttpClient;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

const PHONEPE_PROD_URL: &str = "https://api.phonepe.com/apis/hermes";
const PHONEPE_SANDBOX_URL: &str = "https://api-preprod.phonepe.com/apis/pg-sandbox";

const PAY_PATH: &str = "/pg/v1/pay";
const STATUS_PATH: &str = "/pg/v1/status";

#[derive(Debug, Clone)]
pub struct PhonePeConfig {
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: String,
    pub environment: GatewayEnvironment,
    /// Overrides the environment-selected base URL when set.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl PhonePeConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let merchant_id = std::env::var("PHONEPE_MERCHANT_ID").map_err(|_| {
            GatewayError::ConfigurationError {
                message: "PHONEPE_MERCHANT_ID environment variable is required".to_string(),
            }
        })?;
        let salt_key =
            std::env::var("PHONEPE_SALT_KEY").map_err(|_| GatewayError::ConfigurationError {
                message: "PHONEPE_SALT_KEY environment variable is required".to_string(),
            })?;

        let config = Self {
            merchant_id,
            salt_key,
            salt_index: std::env::var("PHONEPE_SALT_INDEX").unwrap_or_else(|_| "1".to_string()),
            environment: GatewayEnvironment::parse_or_sandbox(
                &std::env::var("PHONEPE_ENVIRONMENT").unwrap_or_default(),
            ),
            base_url: std::env::var("PHONEPE_BASE_URL").ok(),
            timeout_secs: std::env::var("PHONEPE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("PHONEPE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.merchant_id.trim().is_empty() {
            return Err(GatewayError::ConfigurationError {
                message: "merchant id must not be empty".to_string(),
            });
        }
        if self.salt_key.trim().is_empty() {
            return Err(GatewayError::ConfigurationError {
                message: "salt key must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        if let Some(url) = self.base_url.as_deref() {
            return url;
        }
        match self.environment {
            GatewayEnvironment::Production => PHONEPE_PROD_URL,
            GatewayEnvironment::Sandbox => PHONEPE_SANDBOX_URL,
        }
    }

    fn status_path(&self, transaction_id: &str) -> String {
        format!("{}/{}/{}", STATUS_PATH, self.merchant_id, transaction_id)
    }
}

pub struct PhonePeClient {
    config: PhonePeConfig,
    http: GatewayHttpClient,
}

impl PhonePeClient {
    pub fn new(config: PhonePeConfig) -> GatewayResult<Self> {
        config.validate()?;
        let http =
            GatewayHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> GatewayResult<Self> {
        Self::new(PhonePeConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }
}

#[async_trait]
impl PaymentGateway for PhonePeClient {
    async fn create_payment(&self, request: PayPageRequest) -> GatewayResult<PayPageRedirect> {
        if request.amount_minor_units < 1 {
            return Err(GatewayError::ValidationError {
                message: "amount must be at least one minor unit".to_string(),
                field: Some("amount".to_string()),
            });
        }

        let payload = serde_json::json!({
            "merchantId": self.config.merchant_id,
            "merchantTransactionId": request.transaction_id,
            "merchantUserId": request.merchant_user_id,
            "amount": request.amount_minor_units,
            "redirectUrl": request.redirect_url,
            "redirectMode": "REDIRECT",
            "callbackUrl": request.callback_url,
            "mobileNumber": request.mobile_number,
            "paymentInstrument": {"type": "PAY_PAGE"},
        });

        let body_base64 = BASE64.encode(payload.to_string());
        let x_verify = checksum::sign_request(
            &body_base64,
            PAY_PATH,
            &self.config.salt_key,
            &self.config.salt_index,
        );

        info!(
            transaction_id = %request.transaction_id,
            environment = %self.config.environment.as_str(),
            "initiating hosted-page payment"
        );

        let raw: PhonePeEnvelope = self
            .http
            .post_signed(
                &self.endpoint(PAY_PATH),
                &x_verify,
                &serde_json::json!({"request": body_base64}),
            )
            .await?;

        if !raw.success {
            return Err(GatewayError::Rejected {
                code: raw.code,
                message: raw
                    .message
                    .unwrap_or_else(|| "payment initiation rejected".to_string()),
                retryable: false,
            });
        }

        let redirect_url = raw
            .data
            .as_ref()
            .and_then(|d| d.pointer("/instrumentResponse/redirectInfo/url"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload {
                message: "pay response is missing instrumentResponse.redirectInfo.url".to_string(),
            })?
            .to_string();

        Ok(PayPageRedirect {
            transaction_id: request.transaction_id,
            redirect_url,
            provider_data: raw.data,
        })
    }

    async fn check_status(&self, transaction_id: &str) -> GatewayResult<GatewayStatus> {
        let path = self.config.status_path(transaction_id);
        let x_verify =
            checksum::sign_path(&path, &self.config.salt_key, &self.config.salt_index);

        // The status endpoint reports non-terminal transactions with
        // success=false; the `code` field alone is authoritative.
        let raw: JsonValue = self
            .http
            .get_signed(&self.endpoint(&path), &x_verify, &self.config.merchant_id)
            .await?;

        let code = raw
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload {
                message: "status response is missing code".to_string(),
            })?
            .to_string();

        let data = raw.get("data");
        Ok(GatewayStatus {
            status: PaymentStatus::from_provider_code(&code),
            provider_transaction_id: data
                .and_then(|d| d.get("transactionId"))
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            state: data
                .and_then(|d| d.get("state"))
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            payment_instrument: data.and_then(|d| d.get("paymentInstrument")).cloned(),
            code,
            raw,
        })
    }

    fn verify_callback(&self, body_base64: &str, signature: &str) -> bool {
        checksum::verify_response(
            body_base64,
            &self.config.salt_key,
            &self.config.salt_index,
            signature,
        )
    }

    fn decode_callback(&self, body_base64: &str) -> GatewayResult<DecodedCallback> {
        let decoded =
            BASE64
                .decode(body_base64.trim())
                .map_err(|e| GatewayError::MalformedPayload {
                    message: format!("callback body is not valid base64: {}", e),
                })?;
        let raw: JsonValue =
            serde_json::from_slice(&decoded).map_err(|e| GatewayError::MalformedPayload {
                message: format!("callback body is not valid JSON: {}", e),
            })?;
        let envelope = serde_json::from_value(raw.clone()).map_err(|e| {
            GatewayError::MalformedPayload {
                message: format!("callback payload has unexpected structure: {}", e),
            }
        })?;
        Ok(DecodedCallback { envelope, raw })
    }
}

#[derive(Debug, Deserialize)]
struct PhonePeEnvelope {
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<JsonValue>,
}
