use crate::database::payment_repository::NewPaymentRecord;
use crate::database::repository::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::gateway::error::GatewayError;
use crate::gateway::provider::PaymentGateway;
use crate::gateway::types::{GatewayEnvironment, PayPageRequest, PaymentStatus};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Checkout input, validated before any record is created.
#[derive(Debug, Clone)]
pub struct InitiatePayment {
    /// Decimal major units, e.g. 299.00 rupees.
    pub amount: f64,
    pub phone: String,
    pub user_id: Option<String>,
    pub internal_order_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub transaction_id: String,
    pub redirect_url: String,
}

/// Convert a major-unit amount to minor units (paise), rounding the way the
/// storefront totals are rounded.
pub fn to_minor_units(amount: f64) -> AppResult<i64> {
    let decimal = Decimal::from_f64(amount)
        .ok_or_else(|| AppError::validation("amount is not a valid number", Some("amount")))?;
    if decimal <= Decimal::ZERO {
        return Err(AppError::validation(
            "amount must be greater than zero",
            Some("amount"),
        ));
    }
    let minor = (decimal * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::validation("amount is out of range", Some("amount")))?;
    if minor < 1 {
        return Err(AppError::validation(
            "amount must be at least one minor unit",
            Some("amount"),
        ));
    }
    Ok(minor)
}

/// Creates the pending payment record and the provider pay-page session.
///
/// The record write happens before the gateway call: even if the network
/// request never completes, a PENDING row exists for the sweeper to converge.
pub struct PaymentInitiationService {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    /// Which provider deployment records are created against; stored in the
    /// record metadata so sandbox transactions stay identifiable.
    environment: GatewayEnvironment,
    /// Where the provider posts server-to-server callbacks.
    callback_url: String,
}

impl PaymentInitiationService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        environment: GatewayEnvironment,
        callback_url: String,
    ) -> Self {
        Self {
            payments,
            gateway,
            environment,
            callback_url,
        }
    }

    pub async fn initiate(&self, request: InitiatePayment) -> AppResult<InitiatedPayment> {
        let amount_minor_units = to_minor_units(request.amount)?;

        if request.internal_order_id.trim().is_empty() {
            return Err(AppError::validation(
                "internal order id is required",
                Some("internalOrderId"),
            ));
        }
        if !request.redirect_url.starts_with("http://")
            && !request.redirect_url.starts_with("https://")
        {
            return Err(AppError::validation(
                "redirect URL must be absolute",
                Some("redirectUrl"),
            ));
        }

        let transaction_id = Uuid::new_v4().to_string();

        // Source of truth first: the PENDING row must exist before the
        // provider learns about the transaction.
        self.payments
            .create(NewPaymentRecord {
                transaction_id: transaction_id.clone(),
                amount_minor_units,
                user_id: request.user_id.clone(),
                metadata: json!({
                    "phone": request.phone,
                    "environment": self.environment.as_str(),
                    "internal_order_id": request.internal_order_id,
                }),
            })
            .await?;

        info!(
            transaction_id = %transaction_id,
            internal_order_id = %request.internal_order_id,
            amount_minor_units,
            "payment record created"
        );

        let pay_request = PayPageRequest {
            transaction_id: transaction_id.clone(),
            amount_minor_units,
            merchant_user_id: request
                .user_id
                .clone()
                .unwrap_or_else(|| format!("MUID-{}", transaction_id)),
            redirect_url: request.redirect_url.clone(),
            callback_url: self.callback_url.clone(),
            mobile_number: request.phone.clone(),
        };

        match self.gateway.create_payment(pay_request).await {
            Ok(redirect) => Ok(InitiatedPayment {
                transaction_id,
                redirect_url: redirect.redirect_url,
            }),
            Err(e @ GatewayError::NetworkError { .. })
            | Err(e @ GatewayError::RateLimitError { .. }) => {
                // The provider may or may not have seen the request; the
                // record stays PENDING and the sweeper settles it.
                warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "gateway unreachable during initiation; record left pending"
                );
                Err(e.into())
            }
            Err(e) => {
                let marked = self
                    .payments
                    .resolve_pending(
                        &transaction_id,
                        PaymentStatus::Failed,
                        None,
                        &json!({"initiation_error": e.to_string()}),
                    )
                    .await;
                if let Err(db_err) = marked {
                    warn!(
                        transaction_id = %transaction_id,
                        error = %db_err,
                        "failed to mark rejected initiation as FAILED"
                    );
                }
                Err(e.into())
            }
        }
    }
}
