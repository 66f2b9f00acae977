//! Conformance test suite for the bundled backends.
//!
//! Each test function corresponds to a single conformance check so a
//! failure points at one clause of the adapter contract.

#![allow(clippy::expect_used, clippy::panic, clippy::unwrap_used)]

use std::sync::Arc;

use linkauth_storage::{FileBackend, MemoryBackend, conformance, testutil::FaultyBackend};
use tempfile::TempDir;

async fn file_backend() -> (TempDir, FileBackend) {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = FileBackend::open(dir.path()).await.expect("open file backend");
    (dir, backend)
}

// ============================================================================
// MemoryBackend
// ============================================================================

#[tokio::test]
async fn memory_load_missing_returns_none() {
    conformance::load_missing_returns_none(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn memory_store_then_load_roundtrips() {
    conformance::store_then_load_roundtrips(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn memory_store_overwrites_existing() {
    conformance::store_overwrites_existing(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn memory_delete_then_load_returns_none() {
    conformance::delete_then_load_returns_none(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn memory_delete_missing_is_noop() {
    conformance::delete_missing_is_noop(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn memory_identity_keys_are_isolated() {
    conformance::identity_keys_are_isolated(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn memory_unusual_identity_keys() {
    conformance::unusual_identity_keys(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn memory_large_blob_roundtrip() {
    conformance::large_blob_roundtrip(&MemoryBackend::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_concurrent_distinct_keys() {
    conformance::concurrent_distinct_keys(Arc::new(MemoryBackend::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_concurrent_same_key_last_write_wins() {
    conformance::concurrent_same_key_last_write_wins(Arc::new(MemoryBackend::new())).await;
}

#[tokio::test]
async fn memory_health_check_succeeds() {
    conformance::health_check_succeeds(&MemoryBackend::new()).await;
}

// ============================================================================
// FileBackend
// ============================================================================

#[tokio::test]
async fn file_load_missing_returns_none() {
    let (_dir, backend) = file_backend().await;
    conformance::load_missing_returns_none(&backend).await;
}

#[tokio::test]
async fn file_store_then_load_roundtrips() {
    let (_dir, backend) = file_backend().await;
    conformance::store_then_load_roundtrips(&backend).await;
}

#[tokio::test]
async fn file_store_overwrites_existing() {
    let (_dir, backend) = file_backend().await;
    conformance::store_overwrites_existing(&backend).await;
}

#[tokio::test]
async fn file_delete_then_load_returns_none() {
    let (_dir, backend) = file_backend().await;
    conformance::delete_then_load_returns_none(&backend).await;
}

#[tokio::test]
async fn file_delete_missing_is_noop() {
    let (_dir, backend) = file_backend().await;
    conformance::delete_missing_is_noop(&backend).await;
}

#[tokio::test]
async fn file_identity_keys_are_isolated() {
    let (_dir, backend) = file_backend().await;
    conformance::identity_keys_are_isolated(&backend).await;
}

#[tokio::test]
async fn file_unusual_identity_keys() {
    let (_dir, backend) = file_backend().await;
    conformance::unusual_identity_keys(&backend).await;
}

#[tokio::test]
async fn file_large_blob_roundtrip() {
    let (_dir, backend) = file_backend().await;
    conformance::large_blob_roundtrip(&backend).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_concurrent_distinct_keys() {
    let (_dir, backend) = file_backend().await;
    conformance::concurrent_distinct_keys(Arc::new(backend)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_concurrent_same_key_last_write_wins() {
    let (dir, backend) = file_backend().await;
    conformance::concurrent_same_key_last_write_wins(Arc::new(backend)).await;

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[tokio::test]
async fn file_health_check_succeeds() {
    let (_dir, backend) = file_backend().await;
    conformance::health_check_succeeds(&backend).await;
}

// ============================================================================
// FaultyBackend passes through when no fault is armed
// ============================================================================

#[tokio::test]
async fn faulty_passthrough_roundtrips() {
    let backend = FaultyBackend::new();
    conformance::store_then_load_roundtrips(&backend).await;
    conformance::delete_then_load_returns_none(&backend).await;
    assert_eq!(backend.store_count(), 2);
    assert_eq!(backend.delete_count(), 1);
}

#[tokio::test]
async fn faulty_armed_store_is_transient() {
    use linkauth_storage::{StorageBackend, assert_transient};

    let backend = FaultyBackend::new();
    backend.fail_stores(true);
    let result = backend.store("K", "blob".to_owned()).await;
    assert_transient!(result);
    assert!(backend.inner().is_empty());
}
