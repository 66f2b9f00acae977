//! Shared test utilities for persistence adapter testing.
//!
//! Feature-gated behind `testutil` so that test doubles never leak into
//! production builds.
//!
//! ```toml
//! [dev-dependencies]
//! linkauth-storage = { path = "../storage", features = ["testutil"] }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    StorageBackend,
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
};

/// A [`MemoryBackend`] wrapper that counts calls and fails on demand.
///
/// Failures are reported as [`StorageError::Connection`], the shape an
/// unreachable network store produces. Clones share counters and switches.
#[derive(Clone, Default)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    fail_loads: Arc<AtomicBool>,
    fail_stores: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    loads: Arc<AtomicUsize>,
    stores: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl FaultyBackend {
    /// Wraps a fresh [`MemoryBackend`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing backend so its contents can be inspected directly.
    #[must_use]
    pub fn wrapping(inner: MemoryBackend) -> Self {
        Self { inner, ..Self::default() }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    /// Makes every subsequent `load` fail (or succeed again).
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `store` fail (or succeed again).
    pub fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `delete` fail (or succeed again).
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of `load` calls observed, including failed ones.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `store` calls observed, including failed ones.
    #[must_use]
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls observed, including failed ones.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for FaultyBackend {
    async fn load(&self, identity_key: &str) -> StorageResult<Option<String>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::connection("injected load failure"));
        }
        self.inner.load(identity_key).await
    }

    async fn store(&self, identity_key: &str, blob: String) -> StorageResult<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(StorageError::connection("injected store failure"));
        }
        self.inner.store(identity_key, blob).await
    }

    async fn delete(&self, identity_key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::connection("injected delete failure"));
        }
        self.inner.delete(identity_key).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}

/// Assert that a [`StorageResult`] failed with a transient error.
#[macro_export]
macro_rules! assert_transient {
    ($result:expr) => {
        match &$result {
            Err(e) => assert!(e.is_transient(), "expected a transient error, got: {e:?}"),
            Ok(v) => panic!("expected a transient error, got Ok({v:?})"),
        }
    };
}
