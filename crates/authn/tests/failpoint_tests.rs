#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the authn crate.
//!
//! These tests require both `failpoints` and `testutil` features:
//! ```bash
//! cargo test -p linkauth-authn --features failpoints,testutil --test failpoint_tests
//! ```

use std::sync::Arc;

use linkauth_authn::{
    AuthError, AuthStateConfig, AuthStateManager, Buffer, KeyBatch, KeyMaterial, KeyType,
    testutil::FixedCredentials,
};
use linkauth_storage::{MemoryBackend, RetryConfig, StorageBackend};

async fn setup() -> (AuthStateManager, MemoryBackend) {
    let backend = MemoryBackend::new();
    let config = AuthStateConfig::builder()
        .identity_key("fp")
        .retry(RetryConfig::disabled())
        .build()
        .expect("valid config");
    let manager =
        AuthStateManager::bootstrap(config, Arc::new(backend.clone()), &FixedCredentials::new(1))
            .await
            .expect("bootstrap");
    (manager, backend)
}

fn batch() -> KeyBatch {
    let mut batch = KeyBatch::new();
    batch.insert("K", KeyMaterial::SenderKey(Buffer::from([1u8; 10])));
    batch
}

#[tokio::test]
async fn store_failpoint_fails_set() {
    let scenario = fail::FailScenario::setup();
    let (manager, backend) = setup().await;

    fail::cfg("auth-state-before-store", "return").expect("failed to configure fail point");

    let result = manager.set(batch()).await;
    assert!(matches!(result, Err(AuthError::PersistenceUnavailable(_))), "got {result:?}");
    assert!(backend.is_empty(), "nothing reaches the backend");
    assert_eq!(manager.get(KeyType::SenderKey, ["K"]).len(), 1);

    scenario.teardown();
}

#[tokio::test]
async fn backend_failpoint_fails_set() {
    let scenario = fail::FailScenario::setup();
    let (manager, backend) = setup().await;

    fail::cfg("memory-store", "return").expect("failed to configure fail point");

    let result = manager.set(batch()).await;
    assert!(result.expect_err("store should fail").is_persistence());
    assert!(backend.load("fp").await.expect("load").is_none());

    scenario.teardown();
}

#[tokio::test]
async fn set_succeeds_without_failpoint() {
    let scenario = fail::FailScenario::setup();
    let (manager, backend) = setup().await;

    manager.set(batch()).await.expect("set should succeed");
    assert!(!backend.is_empty());

    scenario.teardown();
}
