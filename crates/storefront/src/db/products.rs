//! Catalog reads from the `products` table.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use palma_core::{ProductId, ProductStatus};

use crate::catalog::{Catalog, CatalogError, CatalogProduct};

/// `products`-backed [`Catalog`].
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a catalog over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for product queries.
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    size_ml: i32,
    price: Decimal,
    image_url: Option<String>,
    stock: i32,
    status: ProductStatus,
    rating: Decimal,
    reviews_count: i32,
}

impl From<ProductRow> for CatalogProduct {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            size_ml: r.size_ml,
            price: r.price,
            image_url: r.image_url,
            stock: r.stock,
            status: r.status,
            rating: r.rating,
            reviews_count: r.reviews_count,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, size_ml, price, image_url, stock, status, rating, reviews_count";

#[async_trait]
impl Catalog for PgCatalog {
    async fn get_by_id(&self, id: ProductId) -> Result<Option<CatalogProduct>, CatalogError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::db::RepositoryError::from)?;

        Ok(row.map(CatalogProduct::from))
    }

    async fn list_active(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE status = 'Active' ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(crate::db::RepositoryError::from)?;

        Ok(rows.into_iter().map(CatalogProduct::from).collect())
    }
}
