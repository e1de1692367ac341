//! Product catalog lookups.
//!
//! The catalog is the source of truth for whether a product exists and for its
//! name, price and image. The cart service only reads from it.
//!
//! # Adapters
//!
//! - [`PgCatalog`](crate::db::PgCatalog) - the `products` table
//! - [`InMemoryCatalog`] - fixed product list for tests and demos
//! - [`CachedCatalog`] - wraps any catalog with a `moka` cache

mod cache;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use palma_core::{LineDetails, ProductId, ProductStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::RepositoryError;

pub use cache::CachedCatalog;

/// Image reference used when a product has no image.
pub const PLACEHOLDER_IMAGE: &str = "🫒";

/// Errors that can occur when reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The catalog could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// A product as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Bottle size in millilitres.
    pub size_ml: i32,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub stock: i32,
    pub status: ProductStatus,
    pub rating: Decimal,
    pub reviews_count: i32,
}

impl CatalogProduct {
    /// Whether any units are available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Image URL, or the placeholder glyph when none is set.
    #[must_use]
    pub fn image_ref(&self) -> &str {
        self.image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(PLACEHOLDER_IMAGE)
    }

    /// Display fields a cart line needs for this product.
    #[must_use]
    pub fn line_details(&self) -> LineDetails {
        LineDetails {
            name: self.name.clone(),
            unit_price: self.price,
            image_ref: self.image_ref().to_string(),
        }
    }
}

/// Read-only access to catalog products.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a product. `None` means the product does not exist.
    async fn get_by_id(&self, id: ProductId) -> Result<Option<CatalogProduct>, CatalogError>;

    /// Active products, newest first.
    async fn list_active(&self) -> Result<Vec<CatalogProduct>, CatalogError>;
}

// =============================================================================
// InMemoryCatalog
// =============================================================================

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: Vec<CatalogProduct>,
    failing: bool,
}

/// In-memory catalog for tests and demos.
///
/// Products are listed in reverse insertion order, matching "newest first".
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.upsert(product);
        }
        catalog
    }

    /// Insert or replace a product.
    pub fn upsert(&self, product: CatalogProduct) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.products.retain(|p| p.id != product.id);
        state.products.push(product);
    }

    /// Delete a product.
    pub fn remove(&self, id: ProductId) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .products
            .retain(|p| p.id != id);
    }

    /// Make every subsequent call fail with `CatalogError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).failing = failing;
    }

    /// Number of `get_by_id` calls served so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, InMemoryCatalogState>, CatalogError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.failing {
            return Err(CatalogError::Unavailable("catalog offline".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_by_id(&self, id: ProductId) -> Result<Option<CatalogProduct>, CatalogError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.read()?.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        Ok(self
            .read()?
            .products
            .iter()
            .rev()
            .filter(|p| p.status == ProductStatus::Active)
            .cloned()
            .collect())
    }
}

/// Build a catalog product with sensible defaults.
///
/// Used by tests and the demo seed data.
#[must_use]
pub fn sample_product(id: i32, name: &str, price: Decimal) -> CatalogProduct {
    CatalogProduct {
        id: ProductId::new(id),
        name: name.to_string(),
        description: None,
        size_ml: 500,
        price,
        image_url: None,
        stock: 10,
        status: ProductStatus::Active,
        rating: Decimal::from(5),
        reviews_count: 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_details_fall_back_to_placeholder() {
        let product = sample_product(1, "Extra Virgin", Decimal::from(1000));
        let details = product.line_details();
        assert_eq!(details.name, "Extra Virgin");
        assert_eq!(details.unit_price, Decimal::from(1000));
        assert_eq!(details.image_ref, PLACEHOLDER_IMAGE);

        let mut with_image = product;
        with_image.image_url = Some("https://cdn.example/ev.png".to_string());
        assert_eq!(with_image.image_ref(), "https://cdn.example/ev.png");
    }

    #[test]
    fn test_in_stock() {
        let mut product = sample_product(1, "A", Decimal::ONE);
        assert!(product.in_stock());
        product.stock = 0;
        assert!(!product.in_stock());
    }

    #[tokio::test]
    async fn test_in_memory_lists_active_newest_first() {
        let mut hidden = sample_product(3, "Hidden", Decimal::ONE);
        hidden.status = ProductStatus::Inactive;
        let catalog = InMemoryCatalog::with_products([
            sample_product(1, "First", Decimal::ONE),
            sample_product(2, "Second", Decimal::ONE),
            hidden,
        ]);

        let names: Vec<String> = catalog
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn test_in_memory_remove_makes_product_absent() {
        let catalog = InMemoryCatalog::with_products([sample_product(1, "A", Decimal::ONE)]);
        catalog.remove(ProductId::new(1));
        assert!(catalog.get_by_id(ProductId::new(1)).await.unwrap().is_none());
    }
}
