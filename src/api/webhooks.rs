use crate::api::AppState;
use crate::gateway::types::PaymentStatus;
use crate::services::status_resolver::ProviderResolution;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info, warn};

/// POST /webhooks/phonepe
///
/// The provider's server-to-server callback. Rejections happen only before
/// signature verification succeeds; after that the handler always answers
/// 200 so provider retries don't storm on downstream hiccups; the
/// reconciliation sweeper converges anything missed here.
pub async fn handle_phonepe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let signature = match headers.get("x-verify").and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            warn!("webhook rejected: missing X-VERIFY header");
            return reject("Missing X-VERIFY header");
        }
    };

    let parsed: JsonValue = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "webhook rejected: body is not JSON");
            return reject("Invalid JSON body");
        }
    };

    let response_base64 = match parsed.get("response").and_then(|v| v.as_str()) {
        Some(value) => value,
        None => {
            warn!("webhook rejected: missing response payload");
            return reject("Missing response payload");
        }
    };

    if !state.gateway.verify_callback(response_base64, signature) {
        // A bad checksum is either corruption or a forgery attempt; nothing
        // is read or written.
        error!("webhook signature mismatch; rejecting without processing");
        return reject("Invalid signature");
    }

    let decoded = match state.gateway.decode_callback(response_base64) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "webhook rejected: payload failed decoding");
            return reject("Invalid payload structure");
        }
    };

    let transaction_id = decoded.envelope.data.merchant_transaction_id.clone();
    let resolution = ProviderResolution {
        status: PaymentStatus::from_provider_code(&decoded.envelope.code),
        code: decoded.envelope.code.clone(),
        provider_transaction_id: decoded.envelope.data.transaction_id.clone(),
        audit: json!({"webhook_data": decoded.raw}),
    };

    match state.resolver.apply(&transaction_id, resolution).await {
        Ok(outcome) => {
            info!(
                transaction_id = %transaction_id,
                code = %decoded.envelope.code,
                outcome = outcome.label(),
                "webhook processed"
            );
        }
        Err(e) => {
            // Past verification the provider must see success; the sweeper
            // re-derives this record's state on its next pass.
            error!(
                transaction_id = %transaction_id,
                error = %e,
                "webhook accepted but record update failed"
            );
        }
    }

    (StatusCode::OK, Json(json!({"success": true}))).into_response()
}

fn reject(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": message})),
    )
        .into_response()
}
