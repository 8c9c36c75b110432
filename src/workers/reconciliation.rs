use crate::database::repository::{OrderStore, PaymentStore};
use crate::error::AppResult;
use crate::gateway::provider::PaymentGateway;
use crate::services::status_resolver::{ProviderResolution, ResolutionOutcome, StatusResolver};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// How often the in-process worker wakes up to sweep.
    pub poll_interval: Duration,
    /// Only PENDING records older than this are swept, so the sweeper never
    /// races the primary webhook path on fresh transactions.
    pub staleness: Duration,
    /// Maximum records queried per sweep, bounding provider load per run.
    pub batch_size: i64,
    /// Maximum divergence rows reported per sweep.
    pub divergence_limit: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            staleness: Duration::from_secs(60),
            batch_size: 10,
            divergence_limit: 25,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.poll_interval = Duration::from_secs(
            std::env::var("RECONCILE_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.poll_interval.as_secs()),
        );
        cfg.staleness = Duration::from_secs(
            std::env::var("RECONCILE_STALENESS_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.staleness.as_secs()),
        );
        cfg.batch_size = std::env::var("RECONCILE_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(cfg.batch_size);
        cfg.divergence_limit = std::env::var("RECONCILE_DIVERGENCE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(cfg.divergence_limit);
        cfg
    }
}

/// Per-sweep result, also the HTTP response of the on-demand invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub reconciled: usize,
    pub processed: usize,
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

/// Correctness backstop for lost or delayed webhooks.
///
/// Scans stale PENDING records, re-queries the provider per record, and
/// applies the same resolution routine as the webhook handler. One record's
/// failure never aborts the rest of the batch.
pub struct ReconciliationSweeper {
    payments: Arc<dyn PaymentStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    resolver: Arc<StatusResolver>,
    config: ReconciliationConfig,
}

impl ReconciliationSweeper {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        resolver: Arc<StatusResolver>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            payments,
            orders,
            gateway,
            resolver,
            config,
        }
    }

    /// One full sweep pass. Invoked by the periodic worker and by the
    /// on-demand reconciliation endpoint.
    pub async fn run_once(&self) -> AppResult<SweepSummary> {
        let stale = self
            .payments
            .find_stale_pending(self.config.staleness, self.config.batch_size)
            .await?;

        let processed = stale.len();
        let mut reconciled = 0_usize;

        for record in stale {
            let transaction_id = record.transaction_id.as_str();

            let gateway_status = match self.gateway.check_status(transaction_id).await {
                Ok(status) => status,
                Err(e) => {
                    // Transient by contract: the record stays PENDING and the
                    // next pass retries it.
                    warn!(
                        transaction_id = %transaction_id,
                        error = %e,
                        "status check failed during sweep"
                    );
                    continue;
                }
            };

            if !gateway_status.status.is_terminal() {
                continue;
            }

            let resolution = ProviderResolution {
                code: gateway_status.code.clone(),
                status: gateway_status.status,
                provider_transaction_id: gateway_status.provider_transaction_id.clone(),
                audit: json!({"reconciliation": gateway_status.raw}),
            };

            match self.resolver.apply(transaction_id, resolution).await {
                Ok(ResolutionOutcome::Resolved(resolved)) => {
                    reconciled += 1;
                    info!(
                        transaction_id = %transaction_id,
                        status = %resolved.status,
                        "stuck payment reconciled"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        transaction_id = %transaction_id,
                        error = %e,
                        "failed to apply reconciled status"
                    );
                }
            }
        }

        self.probe_divergences().await;

        info!(reconciled, processed, "reconciliation sweep finished");
        Ok(SweepSummary {
            reconciled,
            processed,
        })
    }

    /// Surface confirmed payments whose linked order never caught up.
    async fn probe_divergences(&self) {
        match self
            .orders
            .find_payment_divergences(self.config.divergence_limit)
            .await
        {
            Ok(divergences) => {
                for divergence in &divergences {
                    error!(
                        transaction_id = %divergence.transaction_id,
                        order_id = %divergence.order_id,
                        order_payment_status = %divergence.order_payment_status,
                        "confirmed payment not reflected on linked order"
                    );
                }
            }
            Err(e) => warn!(error = %e, "divergence probe failed"),
        }
    }

    /// Periodic worker loop; sweeps until the shutdown signal flips.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            staleness_secs = self.config.staleness.as_secs(),
            batch_size = self.config.batch_size,
            "reconciliation worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reconciliation worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "reconciliation sweep failed");
                    }
                }
            }
        }

        info!("reconciliation worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::error::GatewayError;
    use crate::gateway::types::PaymentStatus;
    use crate::services::test_support::{
        gateway_status, pending_record, InMemoryOrderStore, InMemoryPaymentStore, ScriptedGateway,
    };

    fn sweeper(
        payments: Arc<InMemoryPaymentStore>,
        orders: Arc<InMemoryOrderStore>,
        gateway: Arc<ScriptedGateway>,
        config: ReconciliationConfig,
    ) -> ReconciliationSweeper {
        let resolver = Arc::new(StatusResolver::new(payments.clone(), orders.clone()));
        ReconciliationSweeper::new(payments, orders, gateway, resolver, config)
    }

    fn test_config() -> ReconciliationConfig {
        ReconciliationConfig {
            poll_interval: Duration::from_secs(60),
            staleness: Duration::from_secs(60),
            batch_size: 10,
            divergence_limit: 25,
        }
    }

    #[tokio::test]
    async fn stale_pending_record_is_reconciled_to_failed() {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let orders = Arc::new(InMemoryOrderStore::with_pending_order("o1"));
        let gateway = Arc::new(ScriptedGateway::new());
        // 90 seconds old, staleness threshold 60 seconds.
        payments.seed(pending_record("txn-old", "o1", 29900, 90));
        gateway.script_status("txn-old", Ok(gateway_status("txn-old", "PAYMENT_ERROR")));

        let summary = sweeper(payments.clone(), orders.clone(), gateway, test_config())
            .run_once()
            .await
            .expect("sweep should succeed");

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.reconciled, 1);
        assert_eq!(
            payments.get("txn-old").unwrap().status,
            PaymentStatus::Failed
        );
        assert_eq!(orders.get("o1").unwrap().payment_status, "failed");
    }

    #[tokio::test]
    async fn fresh_records_are_not_swept() {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        // Only 5 seconds old: below the staleness threshold.
        payments.seed(pending_record("txn-fresh", "o1", 29900, 5));

        let summary = sweeper(payments, orders, gateway.clone(), test_config())
            .run_once()
            .await
            .expect("sweep should succeed");

        assert_eq!(summary.processed, 0);
        assert_eq!(gateway.status_calls(), 0);
    }

    #[tokio::test]
    async fn one_failing_record_does_not_block_the_batch() {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let orders = Arc::new(InMemoryOrderStore::with_pending_order("o2"));
        let gateway = Arc::new(ScriptedGateway::new());
        payments.seed(pending_record("txn-broken", "o1", 10000, 120));
        payments.seed(pending_record("txn-good", "o2", 29900, 90));
        gateway.script_status(
            "txn-broken",
            Err(GatewayError::NetworkError {
                message: "connect timeout".to_string(),
            }),
        );
        gateway.script_status("txn-good", Ok(gateway_status("txn-good", "PAYMENT_SUCCESS")));

        let summary = sweeper(payments.clone(), orders.clone(), gateway, test_config())
            .run_once()
            .await
            .expect("sweep should succeed despite one failure");

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.reconciled, 1);
        // The broken record is untouched and eligible for the next pass.
        assert_eq!(
            payments.get("txn-broken").unwrap().status,
            PaymentStatus::Pending
        );
        assert_eq!(
            payments.get("txn-good").unwrap().status,
            PaymentStatus::Success
        );
        assert_eq!(orders.get("o2").unwrap().payment_status, "completed");
    }

    #[tokio::test]
    async fn provider_still_pending_leaves_record_untouched() {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        payments.seed(pending_record("txn-slow", "o1", 29900, 90));
        gateway.script_status("txn-slow", Ok(gateway_status("txn-slow", "PAYMENT_PENDING")));

        let summary = sweeper(payments.clone(), orders, gateway, test_config())
            .run_once()
            .await
            .expect("sweep should succeed");

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.reconciled, 0);
        assert_eq!(
            payments.get("txn-slow").unwrap().status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn batch_size_bounds_provider_load() {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        for i in 0..5_i64 {
            payments.seed(pending_record(&format!("txn-{}", i), "o1", 100, 120 + i));
        }
        let mut config = test_config();
        config.batch_size = 2;

        let summary = sweeper(payments, orders, gateway.clone(), config)
            .run_once()
            .await
            .expect("sweep should succeed");

        assert_eq!(summary.processed, 2);
        assert_eq!(gateway.status_calls(), 2);
    }

    #[test]
    fn config_defaults_are_sane() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.staleness, Duration::from_secs(60));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
    }
}
