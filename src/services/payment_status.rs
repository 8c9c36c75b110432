use crate::database::repository::PaymentStore;
use crate::error::AppResult;
use crate::gateway::provider::PaymentGateway;
use crate::gateway::types::PaymentStatus;
use crate::services::status_resolver::{ProviderResolution, StatusResolver};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// Trusted-read response: local truth only, never a provider call.
#[derive(Debug, Clone, Serialize)]
pub struct TrustedPaymentStatus {
    pub status: PaymentStatus,
    /// Minor units, as stored.
    pub amount: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub metadata: JsonValue,
}

/// Active-check response, in the shape the storefront polls for after the
/// user returns from the hosted page.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCheckResult {
    pub success: bool,
    /// `PAYMENT_SUCCESS` | `PAYMENT_PENDING` | `PAYMENT_FAILED`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

/// Client-facing status queries: a cheap local read and an on-demand provider
/// check that applies the same resolution logic as the webhook path.
pub struct PaymentStatusService {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    resolver: Arc<StatusResolver>,
}

impl PaymentStatusService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        resolver: Arc<StatusResolver>,
    ) -> Self {
        Self {
            payments,
            gateway,
            resolver,
        }
    }

    /// Side-effect-free read of the stored record.
    pub async fn trusted_read(
        &self,
        transaction_id: &str,
    ) -> AppResult<Option<TrustedPaymentStatus>> {
        let record = self.payments.find_by_transaction_id(transaction_id).await?;
        Ok(record.map(|r| TrustedPaymentStatus {
            status: r.status,
            amount: r.amount_minor_units,
            created_at: r.created_at,
            metadata: r.metadata,
        }))
    }

    /// Query the provider and fold the answer into local state.
    ///
    /// Used as the client's fallback when the redirect return races the
    /// webhook; the caller is expected to poll at staggered intervals and
    /// give up to a "check your order history" state, not block.
    pub async fn active_check(&self, transaction_id: &str) -> AppResult<ActiveCheckResult> {
        let gateway_status = self.gateway.check_status(transaction_id).await?;

        let outcome = self
            .resolver
            .apply(
                transaction_id,
                ProviderResolution {
                    code: gateway_status.code.clone(),
                    status: gateway_status.status,
                    provider_transaction_id: gateway_status.provider_transaction_id.clone(),
                    audit: json!({"status_check": gateway_status.raw}),
                },
            )
            .await?;

        // Local truth wins over the provider's answer when they disagree
        // (e.g. a stale FAILED report after a recorded success).
        let status = outcome
            .record()
            .map(|r| r.status)
            .unwrap_or(gateway_status.status);

        Ok(ActiveCheckResult {
            success: status == PaymentStatus::Success,
            status: status.wire_label().to_string(),
            data: Some(gateway_status.raw),
        })
    }
}
