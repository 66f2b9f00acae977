//! Conformance test suite for [`StorageBackend`] implementations.
//!
//! Each function checks one clause of the adapter contract. Every backend
//! runs the same suite, so behaviour the auth state layer relies on (absent
//! means `None`, last write wins, keys are independent) is verified once per
//! implementation.
//!
//! # Usage
//!
//! ```no_run
//! use linkauth_storage::{MemoryBackend, conformance};
//!
//! #[tokio::test]
//! async fn load_missing_returns_none() {
//!     conformance::load_missing_returns_none(&MemoryBackend::new()).await;
//! }
//! ```

use std::sync::Arc;

use crate::backend::StorageBackend;

/// `load` of an identity key that was never stored returns `Ok(None)`.
pub async fn load_missing_returns_none<B: StorageBackend>(backend: &B) {
    let result = backend.load("never-stored").await;
    assert!(result.is_ok(), "load should not error on missing key: {result:?}");
    assert_eq!(result.expect("checked above"), None, "missing key should return None");
}

/// `store` then `load` returns the same text.
pub async fn store_then_load_roundtrips<B: StorageBackend>(backend: &B) {
    let blob = "{\n  \"creds\": {},\n  \"keys\": {}\n}".to_owned();
    backend.store("K", blob.clone()).await.expect("store should succeed");
    let loaded = backend.load("K").await.expect("load should succeed");
    assert_eq!(loaded, Some(blob));
}

/// A second `store` fully replaces the first (last write wins).
pub async fn store_overwrites_existing<B: StorageBackend>(backend: &B) {
    backend.store("K", "a much longer first blob".to_owned()).await.expect("first store");
    backend.store("K", "short".to_owned()).await.expect("second store");
    let loaded = backend.load("K").await.expect("load should succeed");
    assert_eq!(loaded.as_deref(), Some("short"));
}

/// `delete` removes the blob so a later `load` reports absence.
pub async fn delete_then_load_returns_none<B: StorageBackend>(backend: &B) {
    backend.store("K", "blob".to_owned()).await.expect("store should succeed");
    backend.delete("K").await.expect("delete should succeed");
    assert_eq!(backend.load("K").await.expect("load should succeed"), None);
}

/// `delete` of an absent key is a no-op.
pub async fn delete_missing_is_noop<B: StorageBackend>(backend: &B) {
    backend.delete("never-stored").await.expect("delete of missing key should succeed");
}

/// Operations on one identity key never affect another.
pub async fn identity_keys_are_isolated<B: StorageBackend>(backend: &B) {
    backend.store("alice", "A".to_owned()).await.expect("store alice");
    backend.store("bob", "B".to_owned()).await.expect("store bob");
    backend.store("alice", "A2".to_owned()).await.expect("overwrite alice");
    backend.delete("alice").await.expect("delete alice");

    assert_eq!(backend.load("alice").await.expect("load alice"), None);
    assert_eq!(backend.load("bob").await.expect("load bob").as_deref(), Some("B"));
}

/// Identity keys containing separators, unicode, or hundreds of bytes are
/// stored verbatim and stay distinct.
pub async fn unusual_identity_keys<B: StorageBackend>(backend: &B) {
    let long = "k".repeat(200);
    let long_sibling = format!("{long}2");
    let very_long = "ключ/".repeat(200);
    let keys: [&str; 8] =
        ["a/b", "../escape", "", "ключ", "with space", &long, &long_sibling, &very_long];
    for key in keys {
        let blob = format!("blob for {key}");
        backend.store(key, blob.clone()).await.expect("store unusual key");
    }
    for key in keys {
        let loaded = backend.load(key).await.expect("load unusual key");
        assert_eq!(loaded, Some(format!("blob for {key}")));
    }
    backend.delete(&long).await.expect("delete long key");
    assert_eq!(backend.load(&long).await.expect("load deleted long key"), None);
    assert!(backend.load(&long_sibling).await.expect("load long sibling").is_some());
}

/// Large blobs round-trip without truncation.
pub async fn large_blob_roundtrip<B: StorageBackend>(backend: &B) {
    let blob = "x".repeat(1024 * 1024);
    backend.store("big", blob.clone()).await.expect("store large blob");
    let loaded = backend.load("big").await.expect("load large blob");
    assert_eq!(loaded.map(|b| b.len()), Some(blob.len()));
}

/// Concurrent writers to distinct keys all land.
pub async fn concurrent_distinct_keys<B: StorageBackend + 'static>(backend: Arc<B>) {
    let mut handles = Vec::new();
    for task in 0..8 {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            backend.store(&format!("key-{task}"), format!("blob-{task}")).await
        }));
    }
    for handle in handles {
        handle.await.expect("task should not panic").expect("store should succeed");
    }
    for task in 0..8 {
        let loaded = backend.load(&format!("key-{task}")).await.expect("load");
        assert_eq!(loaded, Some(format!("blob-{task}")));
    }
}

/// Overlapping writers to one key never interleave: every store succeeds
/// and the surviving blob is exactly one of the written values.
pub async fn concurrent_same_key_last_write_wins<B: StorageBackend + 'static>(backend: Arc<B>) {
    const WRITERS: usize = 4;
    for round in 0..20 {
        let blobs: Vec<String> = (0..WRITERS)
            .map(|writer| {
                let fill = char::from(b'a' + u8::try_from(writer).expect("few writers"));
                let data = fill.to_string().repeat(64 * 1024);
                format!(r#"{{"round":{round},"data":"{data}"}}"#)
            })
            .collect();

        let mut handles = Vec::new();
        for blob in &blobs {
            let backend = Arc::clone(&backend);
            let blob = blob.clone();
            handles.push(tokio::spawn(async move { backend.store("K", blob).await }));
        }
        for handle in handles {
            handle.await.expect("task should not panic").expect("concurrent store should succeed");
        }

        let loaded = backend.load("K").await.expect("load").expect("blob should exist");
        assert!(
            blobs.contains(&loaded),
            "round {round}: stored blob matches none of the writes ({} bytes)",
            loaded.len()
        );
    }
}

/// `health_check` succeeds on a usable backend.
pub async fn health_check_succeeds<B: StorageBackend>(backend: &B) {
    backend.health_check().await.expect("health check should succeed");
}
