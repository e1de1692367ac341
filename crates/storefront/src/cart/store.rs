//! Persistence seams for the cart service.
//!
//! The service mirrors its snapshot to one of two stores depending on the
//! current identity:
//!
//! - [`LocalStore`] - a key/value blob store for anonymous shoppers
//! - [`RemoteCartStore`] - a row-per-(identity, product) table for signed-in shoppers

use async_trait::async_trait;
use palma_core::{IdentityId, ProductId};
use thiserror::Error;

use crate::db::RepositoryError;

/// Errors raised by cart store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Key/value blob store used for the anonymous cart.
///
/// The whole cart is stored as one JSON blob under a single fixed key.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the blob stored under `key`.
    async fn set(&self, key: &str, blob: &str) -> Result<(), StoreError>;

    /// Remove the blob stored under `key`.
    ///
    /// Returns Ok even if nothing was stored (idempotent operation).
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// A persisted cart row for a signed-in shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCartRow {
    pub identity: IdentityId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Per-identity cart table.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// All rows stored for an identity.
    async fn list_by_identity(&self, identity: &IdentityId)
    -> Result<Vec<RemoteCartRow>, StoreError>;

    /// Insert or overwrite the quantity for (identity, product).
    async fn upsert(
        &self,
        identity: &IdentityId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), StoreError>;

    /// Delete the row for (identity, product). Missing rows are not an error.
    async fn delete_row(&self, identity: &IdentityId, product_id: ProductId)
    -> Result<(), StoreError>;

    /// Delete every row for an identity.
    async fn delete_all_for_identity(&self, identity: &IdentityId) -> Result<(), StoreError>;
}
