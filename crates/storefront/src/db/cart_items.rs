//! Cart rows for signed-in shoppers.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use palma_core::{IdentityId, ProductId};

use super::RepositoryError;
use crate::cart::{RemoteCartRow, RemoteCartStore, StoreError};

/// `cart_items`-backed [`RemoteCartStore`].
#[derive(Debug, Clone)]
pub struct PgRemoteCartStore {
    pool: PgPool,
}

impl PgRemoteCartStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for cart queries.
#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    quantity: i32,
}

/// Quantities above `i32::MAX` are stored as `i32::MAX`.
fn db_quantity(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

#[async_trait]
impl RemoteCartStore for PgRemoteCartStore {
    async fn list_by_identity(
        &self,
        identity: &IdentityId,
    ) -> Result<Vec<RemoteCartRow>, StoreError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT product_id, quantity
            FROM cart_items
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(identity.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let quantity = u32::try_from(r.quantity).map_err(|_| {
                    RepositoryError::DataCorruption(format!(
                        "negative cart quantity {} for product {}",
                        r.quantity, r.product_id
                    ))
                })?;
                Ok(RemoteCartRow {
                    identity: identity.clone(),
                    product_id: r.product_id,
                    quantity,
                })
            })
            .collect()
    }

    async fn upsert(
        &self,
        identity: &IdentityId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            ",
        )
        .bind(identity.as_str())
        .bind(product_id)
        .bind(db_quantity(quantity))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "cart item"))?;

        debug!(%identity, %product_id, quantity, "Upserted cart row");
        Ok(())
    }

    async fn delete_row(
        &self,
        identity: &IdentityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(identity.as_str())
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_for_identity(&self, identity: &IdentityId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(identity.as_str())
            .execute(&self.pool)
            .await?;

        debug!(%identity, rows = result.rows_affected(), "Cleared cart rows");
        Ok(())
    }
}
