use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::services::initiation::InitiatePayment;
use crate::services::payment_status::{ActiveCheckResult, TrustedPaymentStatus};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: f64,
    pub phone: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub internal_order_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub redirect_url: String,
    /// The internally generated transaction id the client polls on.
    pub order_id: String,
}

/// POST /api/payments
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> AppResult<Json<CreatePaymentResponse>> {
    let initiated = state
        .initiation
        .initiate(InitiatePayment {
            amount: request.amount,
            phone: request.phone,
            user_id: request.user_id,
            internal_order_id: request.internal_order_id,
            redirect_url: request.redirect_url,
        })
        .await?;

    info!(transaction_id = %initiated.transaction_id, "payment initiated");
    Ok(Json(CreatePaymentResponse {
        success: true,
        redirect_url: initiated.redirect_url,
        order_id: initiated.transaction_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    /// The internal transaction id issued at initiation.
    pub order_id: String,
}

/// POST /api/payments/status. Trusted local read, never calls the provider.
pub async fn payment_status(
    State(state): State<AppState>,
    Json(query): Json<StatusQuery>,
) -> AppResult<Json<TrustedPaymentStatus>> {
    state
        .status
        .trusted_read(&query.order_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound(query.order_id))
}

/// POST /api/payments/verify. Active provider check with local update.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(query): Json<StatusQuery>,
) -> AppResult<Json<ActiveCheckResult>> {
    let result = state.status.active_check(&query.order_id).await?;
    Ok(Json(result))
}
