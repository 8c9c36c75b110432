use crate::api::AppState;
use crate::error::AppResult;
use crate::workers::reconciliation::SweepSummary;
use axum::extract::State;
use axum::Json;
use tracing::info;

/// POST /api/payments/reconcile
///
/// On-demand sweep of stuck PENDING payments, for cron invocation or manual
/// operator use. Same code path as the periodic worker.
pub async fn run_reconciliation(State(state): State<AppState>) -> AppResult<Json<SweepSummary>> {
    let summary = state.sweeper.run_once().await?;
    info!(
        reconciled = summary.reconciled,
        processed = summary.processed,
        "on-demand reconciliation finished"
    );
    Ok(Json(summary))
}
