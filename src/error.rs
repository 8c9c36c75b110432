//! Unified error handling for the storefront payment backend
//!
//! Maps the payment core's failure taxonomy onto HTTP status codes and
//! user-facing messages. Detailed diagnostics stay server-side in logs and
//! payment-record metadata; clients get generic messages.

use crate::database::error::DatabaseError;
use crate::gateway::error::GatewayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Missing or invalid deployment configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied input rejected before any record was created.
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Webhook signature mismatch. The store is never touched.
    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("payment not found: {0}")]
    NotFound(String),

    /// The gateway rejected a request or returned garbage; the local record
    /// carries the diagnostics.
    #[error("provider error: {message}")]
    Provider { message: String, retryable: bool },

    /// Network-level failure talking to the gateway. No record mutation;
    /// the next sweep or client re-poll retries.
    #[error("transient error: {0}")]
    Transient(String),

    /// The payment resolved but the linked order could not be updated.
    /// Payment truth wins; the divergence probe surfaces the gap.
    #[error("order linkage error for order {order_id}: {message}")]
    OrderLinkage { order_id: String, message: String },

    #[error("database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider { .. } => StatusCode::BAD_GATEWAY,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::OrderLinkage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a shopper. Never leaks gateway or database
    /// internals.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Configuration(_) => "Payment service is not configured".to_string(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::Authentication(_) => "Invalid signature".to_string(),
            AppError::NotFound(_) => "Payment not found".to_string(),
            AppError::Provider { .. } => "Payment could not be started".to_string(),
            AppError::Transient(_) => {
                "Payment verification is temporarily unavailable, check your order history shortly"
                    .to_string()
            }
            AppError::OrderLinkage { .. } | AppError::Database(_) => {
                "An internal error occurred. Please try again later".to_string()
            }
        }
    }

    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: field.map(|f| f.to_string()),
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ConfigurationError { message } => AppError::Configuration(message),
            GatewayError::ValidationError { message, field } => {
                AppError::Validation { message, field }
            }
            GatewayError::SignatureMismatch { message } => AppError::Authentication(message),
            GatewayError::NetworkError { message } => AppError::Transient(message),
            GatewayError::RateLimitError { message, .. } => AppError::Transient(message),
            GatewayError::MalformedPayload { message } => AppError::Provider {
                message,
                retryable: false,
            },
            GatewayError::Rejected {
                message, retryable, ..
            } => AppError::Provider { message, retryable },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.user_message(),
        }));
        (status, body).into_response()
    }
}
