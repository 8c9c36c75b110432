use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Signature mismatch: {message}")]
    SignatureMismatch { message: String },

    #[error("Malformed gateway payload: {message}")]
    MalformedPayload { message: String },

    #[error("Gateway rejected request: {message}")]
    Rejected {
        code: Option<String>,
        message: String,
        retryable: bool,
    },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::ConfigurationError { .. } => false,
            GatewayError::ValidationError { .. } => false,
            GatewayError::NetworkError { .. } => true,
            GatewayError::RateLimitError { .. } => true,
            GatewayError::SignatureMismatch { .. } => false,
            GatewayError::MalformedPayload { .. } => false,
            GatewayError::Rejected { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            GatewayError::ConfigurationError { .. } => 500,
            GatewayError::ValidationError { .. } => 400,
            GatewayError::NetworkError { .. } => 503,
            GatewayError::RateLimitError { .. } => 429,
            GatewayError::SignatureMismatch { .. } => 400,
            GatewayError::MalformedPayload { .. } => 502,
            GatewayError::Rejected { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            GatewayError::ConfigurationError { .. } => {
                "Payment gateway is not configured".to_string()
            }
            GatewayError::ValidationError { message, .. } => message.clone(),
            GatewayError::NetworkError { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            GatewayError::RateLimitError { .. } => {
                "Too many requests to the payment gateway. Please retry shortly".to_string()
            }
            GatewayError::SignatureMismatch { .. } => "Invalid callback signature".to_string(),
            GatewayError::MalformedPayload { .. } => {
                "Payment gateway returned an unexpected response".to_string()
            }
            GatewayError::Rejected { .. } => "Payment could not be started".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            GatewayError::ValidationError {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            GatewayError::RateLimitError {
                message: "limited".to_string(),
                retry_after_seconds: Some(30)
            }
            .http_status_code(),
            429
        );
        assert_eq!(
            GatewayError::NetworkError {
                message: "timeout".to_string()
            }
            .http_status_code(),
            503
        );
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(GatewayError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!GatewayError::SignatureMismatch {
            message: "bad header".to_string()
        }
        .is_retryable());
        assert!(GatewayError::Rejected {
            code: None,
            message: "upstream 502".to_string(),
            retryable: true
        }
        .is_retryable());
    }

    #[test]
    fn rejected_user_message_stays_generic() {
        let err = GatewayError::Rejected {
            code: Some("KEY_NOT_CONFIGURED".to_string()),
            message: "merchant key missing upstream".to_string(),
            retryable: false,
        };
        assert_eq!(err.user_message(), "Payment could not be started");
    }
}
