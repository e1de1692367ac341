//! Integration tests for Palma.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory scenarios
//! cargo test -p palma-integration-tests
//!
//! # Include the PostgreSQL adapters (the database must be migrated)
//! PALMA_TEST_DATABASE_URL=postgres://localhost/palma_test cargo test -p palma-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_reconciliation` - Identity transitions, stale rows, store failures
//! - `checkout` - Placing orders from a signed-in cart
//! - `postgres_stores` - `PostgreSQL` adapters (skipped without a database)

use std::sync::Arc;

use palma_core::{Identity, IdentityId, LineDetails};
use palma_storefront::cart::{CartService, InMemoryLocalStore, InMemoryRemoteCartStore};
use palma_storefront::catalog::{Catalog, CatalogProduct, InMemoryCatalog, sample_product};
use palma_storefront::identity::SessionIdentityProvider;
use rust_decimal::Decimal;
use secrecy::SecretString;

/// A cart service wired to in-memory adapters, with handles to each adapter.
pub struct TestContext {
    pub catalog: InMemoryCatalog,
    pub local: InMemoryLocalStore,
    pub remote: InMemoryRemoteCartStore,
    pub identity: SessionIdentityProvider,
    pub cart: Arc<CartService>,
}

impl TestContext {
    /// A fresh anonymous session over the standard test catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalog(standard_catalog())
    }

    /// A fresh anonymous session over `catalog`.
    #[must_use]
    pub fn with_catalog(catalog: InMemoryCatalog) -> Self {
        let local = InMemoryLocalStore::new();
        let remote = InMemoryRemoteCartStore::new();
        let cart = Arc::new(CartService::new(
            Arc::new(catalog.clone()),
            Arc::new(local.clone()),
            Arc::new(remote.clone()),
        ));
        Self {
            catalog,
            local,
            remote,
            identity: SessionIdentityProvider::anonymous(),
            cart,
        }
    }

    /// Add one unit of `id`, resolving display fields from the catalog the way
    /// a product page would.
    ///
    /// # Panics
    ///
    /// Panics if the product is not in the catalog.
    pub async fn add(&self, id: i32) {
        let product = self.product(id).await;
        self.cart.add_line(product.id, product.line_details()).await;
    }

    /// Look up a catalog product.
    ///
    /// # Panics
    ///
    /// Panics if the lookup fails or the product does not exist.
    #[allow(clippy::expect_used)]
    pub async fn product(&self, id: i32) -> CatalogProduct {
        self.catalog
            .get_by_id(palma_core::ProductId::new(id))
            .await
            .expect("catalog lookup failed")
            .expect("product not in catalog")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Products 1 (1000), 2 (2500) and 5 (1800).
#[must_use]
pub fn standard_catalog() -> InMemoryCatalog {
    InMemoryCatalog::with_products([
        sample_product(1, "Extra Virgin Olive Oil 500ml", Decimal::from(1000)),
        sample_product(2, "Red Palm Oil 1L", Decimal::from(2500)),
        sample_product(5, "Coconut Oil 750ml", Decimal::from(1800)),
    ])
}

/// Parse a user id.
///
/// # Panics
///
/// Panics if `id` is blank.
#[must_use]
#[allow(clippy::expect_used)]
pub fn user(id: &str) -> IdentityId {
    IdentityId::parse(id).expect("blank user id")
}

/// The signed-in identity for `id`.
#[must_use]
pub fn signed_in(id: &str) -> Identity {
    Identity::from(user(id))
}

/// Display fields for an ad-hoc line.
#[must_use]
pub fn details(name: &str, unit_price: i64) -> LineDetails {
    LineDetails {
        name: name.to_string(),
        unit_price: Decimal::from(unit_price),
        image_ref: palma_storefront::catalog::PLACEHOLDER_IMAGE.to_string(),
    }
}

/// Database URL for the optional `PostgreSQL` tests.
#[must_use]
pub fn test_database_url() -> Option<SecretString> {
    std::env::var("PALMA_TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.is_empty())
        .map(SecretString::from)
}

/// A user id unlikely to collide with other test runs.
#[must_use]
pub fn unique_user(prefix: &str) -> IdentityId {
    user(&format!("{prefix}-{:016x}", rand::random::<u64>()))
}
