//! Cart reconciliation service.
//!
//! [`CartService`] owns the in-memory cart for the current session and mirrors
//! it to whichever store matches the current identity:
//!
//! - anonymous shoppers: the whole cart as one blob in a [`LocalStore`]
//! - signed-in shoppers: one row per product in a [`RemoteCartStore`]
//!
//! # Reconciliation rules
//!
//! - Loading a signed-in cart joins every row against the catalog. Rows for
//!   products that no longer exist are dropped and deleted in the background.
//! - Once a signed-in cart has loaded, the anonymous blob is deleted. The two
//!   carts are never merged: the most recently established identity wins.
//! - Mutations update memory first, notify observers, then persist. Store
//!   failures are logged and never roll the snapshot back.
//! - Store failures while loading yield an empty cart.

mod local;
mod memory;
mod observer;
mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use palma_core::{CartLine, CartSnapshot, Identity, IdentityId, LineDetails, ProductId, QuantityChange};
use rust_decimal::Decimal;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::catalog::Catalog;
use crate::config::DEFAULT_CART_KEY;
use crate::identity::IdentityProvider;

pub use local::{FileLocalStore, InMemoryLocalStore, decode_blob, encode_blob};
pub use memory::{InMemoryRemoteCartStore, RemoteWrite};
pub use observer::ObserverId;
pub use store::{LocalStore, RemoteCartRow, RemoteCartStore, StoreError};

use observer::ObserverRegistry;

/// A store write derived from a snapshot mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    Upsert(ProductId, u32),
    Delete(ProductId),
    DeleteAll,
}

#[derive(Debug, Default)]
struct CartState {
    identity: Identity,
    snapshot: CartSnapshot,
}

/// Keeps the session's cart consistent with its backing store.
///
/// Construct once per session and share by `Arc`.
pub struct CartService {
    catalog: Arc<dyn Catalog>,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteCartStore>,
    storage_key: String,
    state: RwLock<CartState>,
    load_generation: AtomicU64,
    observers: ObserverRegistry,
    cleanup: Mutex<JoinSet<()>>,
}

impl CartService {
    /// Create a service for an anonymous session with an empty cart.
    ///
    /// Call [`load`](Self::load) or [`start_session`](Self::start_session) to
    /// read the persisted cart.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn Catalog>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteCartStore>,
    ) -> Self {
        Self {
            catalog,
            local,
            remote,
            storage_key: DEFAULT_CART_KEY.to_string(),
            state: RwLock::new(CartState::default()),
            load_generation: AtomicU64::new(0),
            observers: ObserverRegistry::default(),
            cleanup: Mutex::new(JoinSet::new()),
        }
    }

    /// Use a different key for the anonymous cart blob.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The identity the cart currently belongs to.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.read_state().identity.clone()
    }

    /// A copy of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.read_state().snapshot.clone()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.read_state().snapshot.total_items()
    }

    /// Sum of `quantity * unit_price` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.read_state().snapshot.total_price()
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a callback invoked with the new cart after every change.
    ///
    /// Callbacks run synchronously on the task that made the change, after the
    /// in-memory cart is updated and before anything is persisted.
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&CartSnapshot) + Send + Sync + 'static,
    {
        self.observers.subscribe(Arc::new(observer))
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Read the identity from `provider` and load that identity's cart.
    ///
    /// A provider failure is treated as an anonymous session.
    pub async fn start_session(&self, provider: &dyn IdentityProvider) {
        let identity = provider.current_identity().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read session identity; continuing anonymously");
            Identity::Anonymous
        });
        self.on_identity_changed(identity).await;
    }

    /// Reload the cart for the current identity.
    #[instrument(skip(self))]
    pub async fn load(&self) {
        let identity = self.identity();
        self.load_as(identity).await;
    }

    /// Switch to `identity` and replace the cart with that identity's cart.
    ///
    /// The previous cart is discarded, not merged.
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn on_identity_changed(&self, identity: Identity) {
        info!("Identity changed, reloading cart");
        self.load_as(identity).await;
    }

    async fn load_as(&self, identity: Identity) {
        let generation = {
            let mut state = self.write_state();
            if state.identity != identity {
                // The previous identity's lines must never be seen under the new one
                state.snapshot.clear();
                state.identity = identity.clone();
            }
            self.load_generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let (snapshot, abandon_local) = match &identity {
            Identity::Anonymous => (self.fetch_local().await, false),
            Identity::Authenticated(user) => match self.fetch_remote(user).await {
                Some(snapshot) => (snapshot, true),
                None => (CartSnapshot::new(), false),
            },
        };

        {
            let mut state = self.write_state();
            if !self.is_current(generation) {
                debug!(identity = %identity, "Discarding superseded cart load");
                return;
            }
            state.snapshot = snapshot.clone();
        }

        // The signed-in cart has taken over; the anonymous cart is abandoned
        if abandon_local
            && self.is_current(generation)
            && let Err(e) = self.local.delete(&self.storage_key).await
        {
            warn!(error = %e, "Failed to clear local cart after sign-in");
        }

        debug!(
            identity = %identity,
            lines = snapshot.len(),
            items = snapshot.total_items(),
            "Cart loaded"
        );
        self.observers.notify(&snapshot);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.load_generation.load(Ordering::SeqCst) == generation
    }

    async fn fetch_local(&self) -> CartSnapshot {
        let blob = match self.local.get(&self.storage_key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return CartSnapshot::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read local cart; using empty cart");
                return CartSnapshot::new();
            }
        };

        decode_blob(&blob).unwrap_or_else(|e| {
            warn!(error = %e, "Local cart is malformed; resetting to empty cart");
            CartSnapshot::new()
        })
    }

    /// Join the identity's rows against the catalog.
    ///
    /// Returns `None` when the remote cart could not be established.
    async fn fetch_remote(&self, user: &IdentityId) -> Option<CartSnapshot> {
        let rows = match self.remote.list_by_identity(user).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Failed to load remote cart; using empty cart");
                return None;
            }
        };

        let mut lines = Vec::with_capacity(rows.len());
        let mut stale = Vec::new();
        for row in rows {
            match self.catalog.get_by_id(row.product_id).await {
                Ok(Some(product)) => {
                    lines.push(CartLine::new(
                        row.product_id,
                        row.quantity,
                        product.line_details(),
                    ));
                }
                Ok(None) => stale.push(row.product_id),
                Err(e) => {
                    // Absence cannot be established, so nothing is deleted
                    warn!(error = %e, "Catalog lookup failed while loading cart; using empty cart");
                    return None;
                }
            }
        }

        if !stale.is_empty() {
            info!(stale = ?stale, "Dropping cart rows for products no longer in the catalog");
            self.spawn_stale_cleanup(user.clone(), stale);
        }

        Some(CartSnapshot::from_lines(lines))
    }

    fn spawn_stale_cleanup(&self, user: IdentityId, stale: Vec<ProductId>) {
        let remote = Arc::clone(&self.remote);
        let mut tasks = self.cleanup.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            for product_id in stale {
                match remote.delete_row(&user, product_id).await {
                    Ok(()) => debug!(%product_id, "Deleted stale cart row"),
                    Err(e) => warn!(error = %e, %product_id, "Failed to delete stale cart row"),
                }
            }
        });
    }

    /// Wait for background stale-row deletions started by earlier loads.
    pub async fn wait_for_cleanup(&self) {
        let mut tasks = std::mem::take(&mut *self.cleanup.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Stale cart cleanup task failed");
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of a product.
    ///
    /// `details` are the catalog fields the caller already resolved; they are
    /// only used when the product is not yet in the cart.
    #[instrument(skip(self, details))]
    pub async fn add_line(&self, product_id: ProductId, details: LineDetails) {
        let change = self.mutate(|cart| {
            let quantity = cart.add_line(product_id, details);
            Some(Persist::Upsert(product_id, quantity))
        });
        self.persist(change).await;
    }

    /// Remove a product's line. Does nothing if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn remove_line(&self, product_id: ProductId) {
        let change = self.mutate(|cart| {
            cart.remove_line(product_id)
                .map(|_| Persist::Delete(product_id))
        });
        self.persist(change).await;
    }

    /// Overwrite a line's quantity; zero or less removes the line.
    ///
    /// Products not in the cart are ignored.
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, product_id: ProductId, quantity: i64) {
        let change = self.mutate(|cart| match cart.set_quantity(product_id, quantity) {
            QuantityChange::Updated(quantity) => Some(Persist::Upsert(product_id, quantity)),
            QuantityChange::Removed => Some(Persist::Delete(product_id)),
            QuantityChange::Missing => None,
        });
        self.persist(change).await;
    }

    /// Empty the cart and delete it from the store.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        let change = self.mutate(|cart| {
            cart.clear();
            Some(Persist::DeleteAll)
        });
        self.persist(change).await;
    }

    /// Apply `f` to the snapshot under the lock, then notify observers.
    ///
    /// Returns what must be persisted, with the identity and snapshot captured
    /// at mutation time.
    fn mutate(
        &self,
        f: impl FnOnce(&mut CartSnapshot) -> Option<Persist>,
    ) -> Option<(Identity, Persist, CartSnapshot)> {
        let change = {
            let mut state = self.write_state();
            let op = f(&mut state.snapshot)?;
            (state.identity.clone(), op, state.snapshot.clone())
        };
        self.observers.notify(&change.2);
        Some(change)
    }

    async fn persist(&self, change: Option<(Identity, Persist, CartSnapshot)>) {
        let Some((identity, op, snapshot)) = change else {
            return;
        };

        let result = match (&identity, op) {
            (Identity::Authenticated(user), Persist::Upsert(product_id, quantity)) => {
                self.remote.upsert(user, product_id, quantity).await
            }
            (Identity::Authenticated(user), Persist::Delete(product_id)) => {
                self.remote.delete_row(user, product_id).await
            }
            (Identity::Authenticated(user), Persist::DeleteAll) => {
                self.remote.delete_all_for_identity(user).await
            }
            (Identity::Anonymous, Persist::DeleteAll) => {
                self.local.delete(&self.storage_key).await
            }
            (Identity::Anonymous, Persist::Upsert(..) | Persist::Delete(_)) => {
                match encode_blob(&snapshot) {
                    Ok(blob) => self.local.set(&self.storage_key, &blob).await,
                    Err(e) => Err(e.into()),
                }
            }
        };

        if let Err(e) = result {
            warn!(error = %e, identity = %identity, op = ?op, "Failed to persist cart change");
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CartState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CartState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reload the cart whenever `provider` publishes a new identity.
    ///
    /// The returned handle stops listening when dropped.
    pub fn spawn_identity_listener(
        self: &Arc<Self>,
        provider: &dyn IdentityProvider,
    ) -> IdentityListener {
        let mut subscription = provider.subscribe();
        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(identity) = subscription.changed().await {
                service.on_identity_changed(identity).await;
            }
            debug!("Identity provider closed; cart listener stopping");
        });
        IdentityListener { handle }
    }
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("storage_key", &self.storage_key)
            .field("state", &*self.read_state())
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

/// Background task forwarding identity changes to a [`CartService`].
///
/// Aborted when dropped.
#[derive(Debug)]
pub struct IdentityListener {
    handle: JoinHandle<()>,
}

impl IdentityListener {
    /// Stop listening.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for IdentityListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
