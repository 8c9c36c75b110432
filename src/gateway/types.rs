use crate::gateway::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Provider status codes that terminate a payment attempt.
pub const CODE_SUCCESS: &str = "PAYMENT_SUCCESS";
pub const CODE_ERROR: &str = "PAYMENT_ERROR";
pub const CODE_DECLINED: &str = "PAYMENT_DECLINED";
pub const CODE_PENDING: &str = "PAYMENT_PENDING";

/// Internal payment lifecycle state.
///
/// `Pending` is the only non-terminal state; records transition exactly once
/// to `Success` or `Failed` and never back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Map a provider status code to the internal state.
    ///
    /// Unknown codes deliberately map to `Pending`: a callback we do not
    /// recognize must be acknowledged without changing local truth.
    pub fn from_provider_code(code: &str) -> Self {
        match code {
            CODE_SUCCESS => PaymentStatus::Success,
            CODE_ERROR | CODE_DECLINED => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    /// Wire label used by the client-facing active status check.
    pub fn wire_label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => CODE_PENDING,
            PaymentStatus::Success => CODE_SUCCESS,
            PaymentStatus::Failed => "PAYMENT_FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            _ => Err(GatewayError::ValidationError {
                message: format!("unsupported payment status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PaymentStatus::from_str(&value).map_err(|e| e.to_string())
    }
}

/// Which provider deployment outbound requests are signed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEnvironment {
    Sandbox,
    Production,
}

impl GatewayEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEnvironment::Sandbox => "SANDBOX",
            GatewayEnvironment::Production => "PRODUCTION",
        }
    }

    /// Anything other than an explicit "PRODUCTION" selects the sandbox.
    pub fn parse_or_sandbox(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("PRODUCTION") {
            GatewayEnvironment::Production
        } else {
            GatewayEnvironment::Sandbox
        }
    }
}

/// Outbound pay-page creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPageRequest {
    pub transaction_id: String,
    pub amount_minor_units: i64,
    pub merchant_user_id: String,
    pub redirect_url: String,
    pub callback_url: String,
    pub mobile_number: String,
}

/// Result of a pay-page creation: where to send the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPageRedirect {
    pub transaction_id: String,
    pub redirect_url: String,
    pub provider_data: Option<JsonValue>,
}

/// Result of an active status query against the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Raw provider status code, e.g. `PAYMENT_SUCCESS`.
    pub code: String,
    /// The internal mapping of `code`.
    pub status: PaymentStatus,
    pub provider_transaction_id: Option<String>,
    pub state: Option<String>,
    pub payment_instrument: Option<JsonValue>,
    /// Full provider response, kept for audit metadata.
    pub raw: JsonValue,
}

/// Decoded webhook callback payload.
///
/// The provider posts `{"response": <base64>}`; this is the shape of the
/// decoded JSON inside. Unknown fields are dropped, missing mandatory fields
/// fail the decode (the ingestion boundary fails closed).
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    pub code: String,
    pub data: CallbackData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackData {
    pub merchant_transaction_id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub payment_instrument: Option<JsonValue>,
}

/// A decoded callback together with the raw JSON it came from.
#[derive(Debug, Clone)]
pub struct DecodedCallback {
    pub envelope: CallbackEnvelope,
    pub raw: JsonValue,
}
