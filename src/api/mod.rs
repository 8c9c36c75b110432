//! HTTP surface: payment initiation, status queries, the provider webhook,
//! and the on-demand reconciliation trigger.

pub mod payments;
pub mod reconcile;
pub mod webhooks;

use crate::gateway::provider::PaymentGateway;
use crate::health::HealthChecker;
use crate::services::payment_status::PaymentStatusService;
use crate::services::initiation::PaymentInitiationService;
use crate::services::status_resolver::StatusResolver;
use crate::workers::reconciliation::ReconciliationSweeper;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub initiation: Arc<PaymentInitiationService>,
    pub status: Arc<PaymentStatusService>,
    pub resolver: Arc<StatusResolver>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub sweeper: Arc<ReconciliationSweeper>,
    pub health: HealthChecker,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .route("/api/payments", post(payments::create_payment))
        .route("/api/payments/status", post(payments::payment_status))
        .route("/api/payments/verify", post(payments::verify_payment))
        .route("/api/payments/reconcile", post(reconcile::run_reconciliation))
        .route("/webhooks/phonepe", post(webhooks::handle_phonepe_webhook))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.check_health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.check_health().await;
    if status.is_healthy() {
        (StatusCode::OK, Json(serde_json::json!({"ready": true})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ready": false})),
        )
    }
}

async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({"alive": true}))
}
