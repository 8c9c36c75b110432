//! Hand-rolled in-memory doubles for the store and gateway seams.
//!
//! Test-only: these mirror the conditional-update and metadata-merge
//! semantics of the Postgres repositories closely enough to exercise the
//! resolution state machine without a database.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::order_repository::PaymentOrderDivergence;
use crate::database::payment_repository::{NewPaymentRecord, PaymentRecord};
use crate::database::repository::{OrderStore, PaymentStore};
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::provider::PaymentGateway;
use crate::gateway::types::{
    DecodedCallback, GatewayStatus, PayPageRedirect, PayPageRequest, PaymentStatus,
};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Shallow JSONB-style merge: keys in `patch` overwrite, everything else
/// survives. Matches `metadata || patch` in Postgres.
fn merge_metadata(base: &mut JsonValue, patch: &JsonValue) {
    if let (Some(base_map), Some(patch_map)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_map {
            base_map.insert(key.clone(), value.clone());
        }
    }
}

pub fn pending_record(
    transaction_id: &str,
    internal_order_id: &str,
    amount_minor_units: i64,
    age_secs: i64,
) -> PaymentRecord {
    let created_at = chrono::Utc::now() - chrono::Duration::seconds(age_secs);
    PaymentRecord {
        transaction_id: transaction_id.to_string(),
        amount_minor_units,
        status: PaymentStatus::Pending,
        provider_transaction_id: None,
        user_id: None,
        metadata: json!({
            "phone": "9999999999",
            "internal_order_id": internal_order_id,
        }),
        created_at,
        updated_at: created_at,
    }
}

// ---------------------------------------------------------------------------
// Payment store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryPaymentStore {
    records: Mutex<HashMap<String, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: PaymentRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.transaction_id.clone(), record);
    }

    pub fn get(&self, transaction_id: &str) -> Option<PaymentRecord> {
        self.records.lock().unwrap().get(transaction_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<PaymentRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, record: NewPaymentRecord) -> Result<PaymentRecord, DatabaseError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.transaction_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                message: format!("duplicate transaction id {}", record.transaction_id),
            }));
        }
        let now = chrono::Utc::now();
        let stored = PaymentRecord {
            transaction_id: record.transaction_id.clone(),
            amount_minor_units: record.amount_minor_units,
            status: PaymentStatus::Pending,
            provider_transaction_id: None,
            user_id: record.user_id,
            metadata: record.metadata,
            created_at: now,
            updated_at: now,
        };
        records.insert(record.transaction_id, stored.clone());
        Ok(stored)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        Ok(self.get(transaction_id))
    }

    async fn resolve_pending(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
        provider_transaction_id: Option<&str>,
        metadata_patch: &JsonValue,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(transaction_id) {
            Some(record) if record.status == PaymentStatus::Pending => {
                record.status = status;
                if let Some(provider_id) = provider_transaction_id {
                    record.provider_transaction_id = Some(provider_id.to_string());
                }
                merge_metadata(&mut record.metadata, metadata_patch);
                record.updated_at = chrono::Utc::now();
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn merge_metadata(
        &self,
        transaction_id: &str,
        metadata_patch: &JsonValue,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(transaction_id) {
            Some(record) => {
                merge_metadata(&mut record.metadata, metadata_patch);
                record.updated_at = chrono::Utc::now();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn find_stale_pending(
        &self,
        older_than: Duration,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>, DatabaseError> {
        let cutoff =
            chrono::Utc::now() - chrono::Duration::seconds(older_than.as_secs() as i64);
        let records = self.records.lock().unwrap();
        let mut stale: Vec<PaymentRecord> = records
            .values()
            .filter(|r| r.status == PaymentStatus::Pending && r.created_at <= cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }
}

// ---------------------------------------------------------------------------
// Order store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub payment_status: String,
    pub status: String,
    pub payment_id: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<String, OrderRow>>,
    mark_paid_calls: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_order(order_id: &str) -> Self {
        let store = Self::default();
        store.orders.lock().unwrap().insert(
            order_id.to_string(),
            OrderRow {
                payment_status: "pending".to_string(),
                status: "pending_payment".to_string(),
                payment_id: None,
                payment_method: None,
            },
        );
        store
    }

    pub fn get(&self, order_id: &str) -> Option<OrderRow> {
        self.orders.lock().unwrap().get(order_id).cloned()
    }

    pub fn mark_paid_calls(&self) -> usize {
        self.mark_paid_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn mark_paid(
        &self,
        order_id: &str,
        payment_id: &str,
        payment_method: &str,
    ) -> Result<(), DatabaseError> {
        self.mark_paid_calls.fetch_add(1, Ordering::SeqCst);
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) => {
                order.payment_status = "completed".to_string();
                order.status = "processing".to_string();
                order.payment_id = Some(payment_id.to_string());
                order.payment_method = Some(payment_method.to_string());
                Ok(())
            }
            None => Err(DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })),
        }
    }

    async fn mark_payment_failed(&self, order_id: &str) -> Result<(), DatabaseError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) => {
                order.payment_status = "failed".to_string();
                Ok(())
            }
            None => Err(DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })),
        }
    }

    async fn find_payment_divergences(
        &self,
        _limit: i64,
    ) -> Result<Vec<PaymentOrderDivergence>, DatabaseError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Gateway double scripted per transaction id.
#[derive(Default)]
pub struct ScriptedGateway {
    create_results: Mutex<HashMap<String, GatewayResult<PayPageRedirect>>>,
    status_results: Mutex<HashMap<String, GatewayResult<GatewayStatus>>>,
    status_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_create(&self, transaction_id: &str, result: GatewayResult<PayPageRedirect>) {
        self.create_results
            .lock()
            .unwrap()
            .insert(transaction_id.to_string(), result);
    }

    pub fn script_status(&self, transaction_id: &str, result: GatewayResult<GatewayStatus>) {
        self.status_results
            .lock()
            .unwrap()
            .insert(transaction_id.to_string(), result);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

pub fn gateway_status(transaction_id: &str, code: &str) -> GatewayStatus {
    GatewayStatus {
        code: code.to_string(),
        status: PaymentStatus::from_provider_code(code),
        provider_transaction_id: Some(format!("T-{}", transaction_id)),
        state: None,
        payment_instrument: Some(json!({"type": "UPI"})),
        raw: json!({
            "success": code == "PAYMENT_SUCCESS",
            "code": code,
            "data": {"merchantTransactionId": transaction_id},
        }),
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_payment(&self, request: PayPageRequest) -> GatewayResult<PayPageRedirect> {
        self.create_results
            .lock()
            .unwrap()
            .remove(&request.transaction_id)
            .unwrap_or_else(|| {
                Ok(PayPageRedirect {
                    transaction_id: request.transaction_id.clone(),
                    redirect_url: "https://pay.example/hosted-page".to_string(),
                    provider_data: None,
                })
            })
    }

    async fn check_status(&self, transaction_id: &str) -> GatewayResult<GatewayStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status_results
            .lock()
            .unwrap()
            .get(transaction_id)
            .cloned()
            .unwrap_or_else(|| Ok(gateway_status(transaction_id, "PAYMENT_PENDING")))
    }

    fn verify_callback(&self, _body_base64: &str, signature: &str) -> bool {
        signature == "scripted-valid"
    }

    fn decode_callback(&self, body_base64: &str) -> GatewayResult<DecodedCallback> {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;

        let decoded =
            BASE64
                .decode(body_base64.trim())
                .map_err(|e| GatewayError::MalformedPayload {
                    message: format!("callback body is not valid base64: {}", e),
                })?;
        let raw: JsonValue =
            serde_json::from_slice(&decoded).map_err(|e| GatewayError::MalformedPayload {
                message: format!("callback body is not valid JSON: {}", e),
            })?;
        let envelope = serde_json::from_value(raw.clone()).map_err(|e| {
            GatewayError::MalformedPayload {
                message: format!("callback payload has unexpected structure: {}", e),
            }
        })?;
        Ok(DecodedCallback { envelope, raw })
    }
}
