//! Persistence adapter trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the durable key-value
//! contract that the auth state layer persists through. Every identity key
//! owns exactly one opaque blob; the adapter never looks inside it.
//!
//! # Design Philosophy
//!
//! - **One blob per identity key**: no partial or incremental formats
//! - **Async by default**: all operations are async for non-blocking I/O
//! - **No cross-key transactions**: operations on one identity key never observe or affect another
//! - **No caching**: the adapter holds no in-memory copy beyond its medium
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Map backend-specific errors to [`StorageError`](crate::StorageError)
//! 3. Run the [`conformance`](crate::conformance) suite against it
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use async_trait::async_trait;

use crate::error::StorageResult;

/// Durable key-value backend addressed by identity key.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and object safe,
/// so they can be injected as `Arc<dyn StorageBackend>`.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`load`](StorageBackend::load) | Read the blob stored under an identity key |
/// | [`store`](StorageBackend::store) | Overwrite the blob (last write wins) |
/// | [`delete`](StorageBackend::delete) | Remove the blob |
/// | [`health_check`](StorageBackend::health_check) | Verify the medium is reachable |
///
/// # Example
///
/// ```
/// use linkauth_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.store("device-1", "{}".to_owned()).await.unwrap();
/// assert_eq!(backend.load("device-1").await.unwrap().as_deref(), Some("{}"));
///
/// backend.delete("device-1").await.unwrap();
/// assert_eq!(backend.load("device-1").await.unwrap(), None);
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Loads the blob stored under `identity_key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(blob))` if a blob exists
    /// - `Ok(None)` if nothing is stored under the key
    /// - `Err(...)` if the medium could not be read
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn load(&self, identity_key: &str) -> StorageResult<Option<String>>;

    /// Stores `blob` under `identity_key`, replacing any prior blob.
    ///
    /// There is no optimistic concurrency: the last `store` wins.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn store(&self, identity_key: &str, blob: String) -> StorageResult<()>;

    /// Removes the blob stored under `identity_key`.
    ///
    /// Deleting a key with no blob is a no-op and returns `Ok(())`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, identity_key: &str) -> StorageResult<()>;

    /// Checks that the backing medium is reachable.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}
