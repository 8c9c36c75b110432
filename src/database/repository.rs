use crate::database::error::DatabaseError;
use crate::database::order_repository::PaymentOrderDivergence;
use crate::database::payment_repository::{NewPaymentRecord, PaymentRecord};
use crate::gateway::types::PaymentStatus;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Durable store for payment records.
///
/// All status mutation goes through `resolve_pending`, whose conditional
/// `WHERE status = 'PENDING'` guard is what makes concurrent webhook
/// deliveries and sweep passes safe without locks.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, DatabaseError>;

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// Atomically move a still-PENDING record to a terminal status, merging
    /// `metadata_patch` additively. Returns `None` when the record does not
    /// exist or is already terminal; the caller treats that as a duplicate
    /// delivery, not a failure.
    async fn resolve_pending(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
        provider_transaction_id: Option<&str>,
        metadata_patch: &JsonValue,
    ) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// Merge audit metadata without touching status. Returns `None` for an
    /// unknown transaction id.
    async fn merge_metadata(
        &self,
        transaction_id: &str,
        metadata_patch: &JsonValue,
    ) -> Result<Option<PaymentRecord>, DatabaseError>;

    /// PENDING records older than `older_than`, oldest first, capped at
    /// `limit`. The reconciliation sweeper's work queue.
    async fn find_stale_pending(
        &self,
        older_than: Duration,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>, DatabaseError>;
}

/// The order-linkage seam: the only two writes the payment core performs
/// against the shop's order entity, plus the divergence probe.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn mark_paid(
        &self,
        order_id: &str,
        payment_id: &str,
        payment_method: &str,
    ) -> Result<(), DatabaseError>;

    async fn mark_payment_failed(&self, order_id: &str) -> Result<(), DatabaseError>;

    /// Payments resolved SUCCESS whose linked order has not reached
    /// `payment_status = completed`. Non-empty output means payment truth and
    /// order truth have diverged and someone should look.
    async fn find_payment_divergences(
        &self,
        limit: i64,
    ) -> Result<Vec<PaymentOrderDivergence>, DatabaseError>;
}
