use crate::database::payment_repository::PaymentRecord;
use crate::database::repository::{OrderStore, PaymentStore};
use crate::error::{AppError, AppResult};
use crate::gateway::types::PaymentStatus;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Label written to the order's `payment_method` column on confirmation.
pub const PAYMENT_METHOD_LABEL: &str = "PhonePe Gateway";

/// A provider-reported outcome for one transaction, ready to be applied.
///
/// Built identically by the webhook handler, the active status check, and the
/// reconciliation sweeper, so all three paths share one write policy.
#[derive(Debug, Clone)]
pub struct ProviderResolution {
    /// Raw provider status code, kept for logging.
    pub code: String,
    pub status: PaymentStatus,
    pub provider_transaction_id: Option<String>,
    /// Audit payload merged additively into the record's metadata.
    pub audit: JsonValue,
}

#[derive(Debug)]
pub enum ResolutionOutcome {
    /// This call performed the PENDING -> terminal transition.
    Resolved(PaymentRecord),
    /// The record was already terminal; audit metadata was merged, nothing
    /// else happened (duplicate delivery).
    AlreadyTerminal(PaymentRecord),
    /// Non-terminal provider code; local truth unchanged.
    StillPending(PaymentRecord),
    /// No record exists for this transaction id.
    UnknownTransaction,
}

impl ResolutionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionOutcome::Resolved(_) => "resolved",
            ResolutionOutcome::AlreadyTerminal(_) => "already_terminal",
            ResolutionOutcome::StillPending(_) => "still_pending",
            ResolutionOutcome::UnknownTransaction => "unknown_transaction",
        }
    }

    pub fn record(&self) -> Option<&PaymentRecord> {
        match self {
            ResolutionOutcome::Resolved(r)
            | ResolutionOutcome::AlreadyTerminal(r)
            | ResolutionOutcome::StillPending(r) => Some(r),
            ResolutionOutcome::UnknownTransaction => None,
        }
    }
}

/// The single status-mapping routine all resolution paths converge on.
///
/// Writes the payment record first (source of truth), then moves the linked
/// order. An order-layer failure is logged and swallowed: the payment record
/// is already correct and the divergence probe makes the gap visible.
pub struct StatusResolver {
    payments: Arc<dyn PaymentStore>,
    orders: Arc<dyn OrderStore>,
}

impl StatusResolver {
    pub fn new(payments: Arc<dyn PaymentStore>, orders: Arc<dyn OrderStore>) -> Self {
        Self { payments, orders }
    }

    pub async fn apply(
        &self,
        transaction_id: &str,
        resolution: ProviderResolution,
    ) -> AppResult<ResolutionOutcome> {
        if !resolution.status.is_terminal() {
            // Acknowledge but do not resolve: unknown or pending codes leave
            // local truth untouched apart from the audit trail.
            return match self
                .payments
                .merge_metadata(transaction_id, &resolution.audit)
                .await?
            {
                Some(record) => Ok(ResolutionOutcome::StillPending(record)),
                None => {
                    warn!(
                        transaction_id = %transaction_id,
                        code = %resolution.code,
                        "status report for unknown transaction"
                    );
                    Ok(ResolutionOutcome::UnknownTransaction)
                }
            };
        }

        let updated = self
            .payments
            .resolve_pending(
                transaction_id,
                resolution.status,
                resolution.provider_transaction_id.as_deref(),
                &resolution.audit,
            )
            .await?;

        match updated {
            Some(record) => {
                info!(
                    transaction_id = %transaction_id,
                    status = %record.status,
                    code = %resolution.code,
                    "payment resolved"
                );
                self.sync_order(&record).await;
                Ok(ResolutionOutcome::Resolved(record))
            }
            None => match self.payments.find_by_transaction_id(transaction_id).await? {
                Some(existing) => {
                    // Duplicate delivery: keep the audit payload, skip all
                    // side effects, report success to the caller.
                    let merged = self
                        .payments
                        .merge_metadata(transaction_id, &resolution.audit)
                        .await?
                        .unwrap_or(existing);
                    info!(
                        transaction_id = %transaction_id,
                        status = %merged.status,
                        "duplicate resolution ignored"
                    );
                    Ok(ResolutionOutcome::AlreadyTerminal(merged))
                }
                None => {
                    warn!(
                        transaction_id = %transaction_id,
                        code = %resolution.code,
                        "terminal status for unknown transaction"
                    );
                    Ok(ResolutionOutcome::UnknownTransaction)
                }
            },
        }
    }

    /// Move the linked order in lockstep with the resolved payment.
    ///
    /// Never propagates an error: the provider must not see a failure for a
    /// payment that is already recorded correctly.
    async fn sync_order(&self, record: &PaymentRecord) {
        let order_id = match record.internal_order_id() {
            Some(id) => id,
            None => {
                warn!(
                    transaction_id = %record.transaction_id,
                    "resolved payment has no linked order"
                );
                return;
            }
        };

        let result = match record.status {
            PaymentStatus::Success => {
                self.orders
                    .mark_paid(order_id, &record.transaction_id, PAYMENT_METHOD_LABEL)
                    .await
            }
            PaymentStatus::Failed => self.orders.mark_payment_failed(order_id).await,
            PaymentStatus::Pending => return,
        };

        match result {
            Ok(()) => info!(
                transaction_id = %record.transaction_id,
                order_id = %order_id,
                payment_status = %record.status,
                "order synced with resolved payment"
            ),
            Err(e) => {
                let linkage = AppError::OrderLinkage {
                    order_id: order_id.to_string(),
                    message: e.to_string(),
                };
                error!(
                    transaction_id = %record.transaction_id,
                    order_id = %order_id,
                    error = %linkage,
                    "failed to sync order with resolved payment"
                );
            }
        }
    }
}
