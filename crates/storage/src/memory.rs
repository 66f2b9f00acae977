//! In-memory storage backend implementation.
//!
//! [`MemoryBackend`] keeps blobs in a process-local map. It satisfies the
//! full [`StorageBackend`] contract and is the default backend for tests and
//! ephemeral sessions.
//!
//! # Example
//!
//! ```
//! use linkauth_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.store("K", "blob".to_owned()).await.unwrap();
//!     let value = backend.load("K").await.unwrap();
//!
//!     assert_eq!(value.as_deref(), Some("blob"));
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all blobs are lost when the process exits

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use fail::fail_point;
use parking_lot::RwLock;

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
};

/// In-memory storage backend using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data, so a clone can stand in for "the same store after a
/// process restart" in tests.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of identity keys currently holding a blob.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` when no blob is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip(self))]
    async fn load(&self, identity_key: &str) -> StorageResult<Option<String>> {
        fail_point!("memory-load", |_| {
            Err(StorageError::connection("injected failure before memory load"))
        });
        Ok(self.data.read().get(identity_key).cloned())
    }

    #[tracing::instrument(skip(self, blob), fields(blob_len = blob.len()))]
    async fn store(&self, identity_key: &str, blob: String) -> StorageResult<()> {
        fail_point!("memory-store", |_| {
            Err(StorageError::connection("injected failure before memory store"))
        });
        self.data.write().insert(identity_key.to_owned(), blob);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, identity_key: &str) -> StorageResult<()> {
        fail_point!("memory-delete", |_| {
            Err(StorageError::connection("injected failure before memory delete"))
        });
        self.data.write().remove(identity_key);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<()> {
        fail_point!("health-check", |_| {
            Err(StorageError::internal("injected health check failure"))
        });
        // Acquiring the read lock proves we're not deadlocked.
        let _unused = self.data.read();
        Ok(())
    }
}
