use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::OrderStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

/// A confirmed payment whose linked order has not caught up.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentOrderDivergence {
    pub transaction_id: String,
    pub order_id: String,
    pub order_payment_status: String,
}

/// Repository for the payment core's narrow view of `shop_orders`.
///
/// The order entity is owned by the shop's order-management side; the payment
/// core only moves its payment columns in lockstep with resolved payments.
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn mark_paid(
        &self,
        order_id: &str,
        payment_id: &str,
        payment_method: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE shop_orders \
             SET payment_status = 'completed', \
                 status = 'processing', \
                 payment_id = $2, \
                 payment_method = $3 \
             WHERE id = $1",
        )
        .bind(order_id)
        .bind(payment_id)
        .bind(payment_method)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }));
        }
        Ok(())
    }

    async fn mark_payment_failed(&self, order_id: &str) -> Result<(), DatabaseError> {
        // Workflow status is left alone so the shop can decide whether the
        // customer retries or the order is cancelled manually.
        let result = sqlx::query(
            "UPDATE shop_orders SET payment_status = 'failed' WHERE id = $1",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }));
        }
        Ok(())
    }

    async fn find_payment_divergences(
        &self,
        limit: i64,
    ) -> Result<Vec<PaymentOrderDivergence>, DatabaseError> {
        sqlx::query_as::<_, PaymentOrderDivergence>(
            "SELECT p.transaction_id, \
                    o.id AS order_id, \
                    o.payment_status AS order_payment_status \
             FROM payments p \
             JOIN shop_orders o ON o.id = p.metadata->>'internal_order_id' \
             WHERE p.status = 'SUCCESS' \
               AND o.payment_status <> 'completed' \
             ORDER BY p.updated_at ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
