//! Anonymous cart persistence.
//!
//! The anonymous cart is a JSON array in the same shape the browser storefront
//! writes to `localStorage`:
//!
//! ```json
//! [{ "id": 1, "name": "Extra Virgin 500ml", "price": 1000, "quantity": 2, "image": "🫒" }]
//! ```
//!
//! Prices may be JSON numbers (browser) or decimal strings (written here).

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use palma_core::{CartLine, CartSnapshot, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::store::{LocalStore, StoreError};
use crate::catalog::PLACEHOLDER_IMAGE;

/// One entry of the stored blob.
#[derive(Debug, Serialize, Deserialize)]
struct StoredLine {
    id: ProductId,
    #[serde(default)]
    name: String,
    price: Decimal,
    quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

/// Decode a stored blob into a snapshot.
///
/// Entries with a non-positive quantity are dropped and duplicate products are
/// merged, so the result always satisfies the snapshot invariants.
///
/// # Errors
///
/// Returns `serde_json::Error` if the blob is not a JSON array of cart entries.
pub fn decode_blob(blob: &str) -> Result<CartSnapshot, serde_json::Error> {
    let stored: Vec<StoredLine> = serde_json::from_str(blob)?;
    let lines = stored.into_iter().filter_map(|s| {
        let quantity = u32::try_from(s.quantity).ok().filter(|q| *q > 0)?;
        Some(CartLine {
            product_id: s.id,
            quantity,
            name: s.name,
            unit_price: s.price,
            image_ref: s
                .image
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        })
    });
    Ok(CartSnapshot::from_lines(lines))
}

/// Encode a snapshot in the stored blob format.
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn encode_blob(snapshot: &CartSnapshot) -> Result<String, serde_json::Error> {
    let stored: Vec<StoredLine> = snapshot
        .iter()
        .map(|l| StoredLine {
            id: l.product_id,
            name: l.name.clone(),
            price: l.unit_price,
            quantity: i64::from(l.quantity),
            image: Some(l.image_ref.clone()),
        })
        .collect();
    serde_json::to_string(&stored)
}

// =============================================================================
// FileLocalStore
// =============================================================================

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    dir: PathBuf,
}

impl FileLocalStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid local store key: {key:?}"),
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl LocalStore for FileLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write then rename so readers never see a half-written blob
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// InMemoryLocalStore
// =============================================================================

#[derive(Debug, Default)]
struct InMemoryLocalState {
    blobs: HashMap<String, String>,
    failing: bool,
}

/// In-memory local store for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocalStore {
    state: Arc<RwLock<InMemoryLocalState>>,
}

impl InMemoryLocalStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with one blob already present.
    #[must_use]
    pub fn with_blob(key: &str, blob: &str) -> Self {
        let store = Self::new();
        store.write().blobs.insert(key.to_string(), blob.to_string());
        store
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.write().failing = failing;
    }

    /// Current blob under `key`, bypassing failure injection.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .blobs
            .get(key)
            .cloned()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryLocalState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.state.read().unwrap_or_else(PoisonError::into_inner).failing {
            return Err(StoreError::Unavailable("local store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        self.check()?;
        self.write().blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.write().blobs.remove(key);
        Ok(())
    }
}
