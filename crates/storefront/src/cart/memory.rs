//! In-memory remote cart store.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use palma_core::{IdentityId, ProductId};

use super::store::{RemoteCartRow, RemoteCartStore, StoreError};

/// A write the store has accepted, recorded for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    Upsert {
        identity: IdentityId,
        product_id: ProductId,
        quantity: u32,
    },
    DeleteRow {
        identity: IdentityId,
        product_id: ProductId,
    },
    DeleteAll {
        identity: IdentityId,
    },
}

#[derive(Debug, Default)]
struct InMemoryRemoteState {
    rows: BTreeMap<(IdentityId, ProductId), u32>,
    writes: Vec<RemoteWrite>,
    fail_on_read: bool,
    fail_on_write: bool,
}

/// In-memory remote cart store.
///
/// Provides the same interface as the `PostgreSQL` store and records every
/// accepted write so tests can assert on what reached the store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemoteCartStore {
    state: Arc<RwLock<InMemoryRemoteState>>,
}

impl InMemoryRemoteCartStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row without recording a write.
    pub fn insert_row(&self, identity: &IdentityId, product_id: ProductId, quantity: u32) {
        self.write()
            .rows
            .insert((identity.clone(), product_id), quantity);
    }

    /// Rows currently stored for an identity, ordered by product.
    #[must_use]
    pub fn rows_for(&self, identity: &IdentityId) -> Vec<(ProductId, u32)> {
        self.read_state(|s| {
            s.rows
                .iter()
                .filter(|((owner, _), _)| owner == identity)
                .map(|((_, product_id), quantity)| (*product_id, *quantity))
                .collect()
        })
    }

    /// Every write accepted so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<RemoteWrite> {
        self.read_state(|s| s.writes.clone())
    }

    /// Make reads fail with `StoreError::Unavailable`.
    pub fn set_fail_on_read(&self, fail: bool) {
        self.write().fail_on_read = fail;
    }

    /// Make writes fail with `StoreError::Unavailable`.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.write().fail_on_write = fail;
    }

    fn read_state<T>(&self, f: impl FnOnce(&InMemoryRemoteState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryRemoteState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, op: RemoteWrite) -> Result<(), StoreError> {
        let mut state = self.write();
        if state.fail_on_write {
            return Err(StoreError::Unavailable("remote cart store offline".to_string()));
        }
        match &op {
            RemoteWrite::Upsert {
                identity,
                product_id,
                quantity,
            } => {
                state
                    .rows
                    .insert((identity.clone(), *product_id), *quantity);
            }
            RemoteWrite::DeleteRow {
                identity,
                product_id,
            } => {
                state.rows.remove(&(identity.clone(), *product_id));
            }
            RemoteWrite::DeleteAll { identity } => {
                state.rows.retain(|(owner, _), _| owner != identity);
            }
        }
        state.writes.push(op);
        Ok(())
    }
}

#[async_trait]
impl RemoteCartStore for InMemoryRemoteCartStore {
    async fn list_by_identity(
        &self,
        identity: &IdentityId,
    ) -> Result<Vec<RemoteCartRow>, StoreError> {
        if self.read_state(|s| s.fail_on_read) {
            return Err(StoreError::Unavailable("remote cart store offline".to_string()));
        }
        Ok(self
            .rows_for(identity)
            .into_iter()
            .map(|(product_id, quantity)| RemoteCartRow {
                identity: identity.clone(),
                product_id,
                quantity,
            })
            .collect())
    }

    async fn upsert(
        &self,
        identity: &IdentityId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.apply(RemoteWrite::Upsert {
            identity: identity.clone(),
            product_id,
            quantity,
        })
    }

    async fn delete_row(
        &self,
        identity: &IdentityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        self.apply(RemoteWrite::DeleteRow {
            identity: identity.clone(),
            product_id,
        })
    }

    async fn delete_all_for_identity(&self, identity: &IdentityId) -> Result<(), StoreError> {
        self.apply(RemoteWrite::DeleteAll {
            identity: identity.clone(),
        })
    }
}
