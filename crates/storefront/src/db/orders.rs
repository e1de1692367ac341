//! Order persistence.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use palma_core::OrderId;

use super::RepositoryError;
use crate::checkout::{OrderDraft, OrderStore};

/// `orders`/`order_items`-backed [`OrderStore`].
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (OrderId,) = sqlx::query_as(
            r"
            INSERT INTO orders (
                user_id, order_number, total_amount,
                shipping_address, shipping_city, shipping_state, shipping_postal_code,
                phone_number, payment_method, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(draft.user_id.as_str())
        .bind(&draft.order_number)
        .bind(draft.total_amount)
        .bind(&draft.shipping.address)
        .bind(&draft.shipping.city)
        .bind(&draft.shipping.state)
        .bind(draft.shipping.postal_code.as_deref())
        .bind(&draft.shipping.phone)
        .bind(draft.payment_method)
        .bind(draft.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "order"))?;

        for item in &draft.items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::Conflict(format!(
                    "quantity {} for product {} is too large",
                    item.quantity, item.product_id
                ))
            })?;
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(id)
            .bind(item.product_id)
            .bind(quantity)
            .bind(item.price_at_purchase)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_write(e, "order item"))?;
        }

        tx.commit().await?;

        debug!(order_id = %id, items = draft.items.len(), "Inserted order");
        Ok(id)
    }
}
