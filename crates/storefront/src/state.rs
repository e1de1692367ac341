//! Application state shared across commands.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cart::{CartService, FileLocalStore, IdentityListener};
use crate::catalog::CachedCatalog;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::db::{PgCatalog, PgOrderStore, PgRemoteCartStore};
use crate::identity::SessionIdentityProvider;

/// A wired-up storefront session.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the cart,
/// catalog, identity and checkout for one shopper.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: Arc<CachedCatalog<PgCatalog>>,
    identity: SessionIdentityProvider,
    cart: Arc<CartService>,
    checkout: Checkout,
    _listener: IdentityListener,
}

impl Storefront {
    /// Wire the `PostgreSQL` adapters, the file-backed anonymous cart and a
    /// session identity provider, then load the cart for the initial identity.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn start(
        config: StorefrontConfig,
        pool: PgPool,
        identity: SessionIdentityProvider,
    ) -> Self {
        let catalog = Arc::new(CachedCatalog::new(
            PgCatalog::new(pool.clone()),
            config.catalog_cache,
        ));
        // Stale lines are only detected against live rows, so the cart skips the cache
        let cart = Arc::new(
            CartService::new(
                Arc::new(PgCatalog::new(pool.clone())),
                Arc::new(FileLocalStore::new(&config.cart.local_store_dir)),
                Arc::new(PgRemoteCartStore::new(pool.clone())),
            )
            .with_storage_key(config.cart.storage_key.clone()),
        );
        let checkout = Checkout::new(
            Arc::clone(&cart),
            Arc::new(PgOrderStore::new(pool.clone())),
            config.shipping_fee,
        );

        cart.start_session(&identity).await;
        let listener = cart.spawn_identity_listener(&identity);

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                pool,
                catalog,
                identity,
                cart,
                checkout,
                _listener: listener,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &CachedCatalog<PgCatalog> {
        &self.inner.catalog
    }

    /// Get a reference to the session identity provider.
    #[must_use]
    pub fn identity(&self) -> &SessionIdentityProvider {
        &self.inner.identity
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get a reference to checkout.
    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    /// Wait for background cart maintenance to finish before exiting.
    pub async fn shutdown(&self) {
        self.inner.cart.wait_for_cleanup().await;
        self.inner.pool.close().await;
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("config", &self.inner.config)
            .field("identity", &self.inner.identity.identity())
            .finish_non_exhaustive()
    }
}
