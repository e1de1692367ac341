//! Cached catalog wrapper.
//!
//! Product lookups and the active listing are cached with `moka`. Absent
//! products are never cached, so a product created after a miss becomes
//! visible on the next lookup.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use palma_core::ProductId;
use tracing::debug;

use super::{Catalog, CatalogError, CatalogProduct};
use crate::config::CatalogCacheConfig;

/// Cache key for products and listings.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(ProductId),
    ActiveProducts,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<CatalogProduct>),
    Products(Arc<Vec<CatalogProduct>>),
}

/// A catalog that caches another catalog's answers.
#[derive(Clone)]
pub struct CachedCatalog<C> {
    inner: C,
    cache: Cache<CacheKey, CacheValue>,
}

impl<C: Catalog> CachedCatalog<C> {
    /// Wrap `inner` with a cache tuned by `config`.
    #[must_use]
    pub fn new(inner: C, config: CatalogCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();
        Self { inner, cache }
    }

    /// Drop a cached product (and the listing it may appear in).
    pub async fn invalidate(&self, id: ProductId) {
        self.cache.invalidate(&CacheKey::Product(id)).await;
        self.cache.invalidate(&CacheKey::ActiveProducts).await;
    }
}

#[async_trait]
impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn get_by_id(&self, id: ProductId) -> Result<Option<CatalogProduct>, CatalogError> {
        let cache_key = CacheKey::Product(id);

        // Check cache
        if let Some(CacheValue::Product(product)) = self.cache.get(&cache_key).await {
            debug!(product_id = %id, "Cache hit for product");
            return Ok(Some(*product));
        }

        let product = self.inner.get_by_id(id).await?;

        // Cache the result
        if let Some(ref product) = product {
            self.cache
                .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }

        Ok(product)
    }

    async fn list_active(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        if let Some(CacheValue::Products(products)) =
            self.cache.get(&CacheKey::ActiveProducts).await
        {
            debug!("Cache hit for active products");
            return Ok(products.as_ref().clone());
        }

        let products = self.inner.list_active().await?;
        self.cache
            .insert(
                CacheKey::ActiveProducts,
                CacheValue::Products(Arc::new(products.clone())),
            )
            .await;

        Ok(products)
    }
}
