#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the lifecycle crate.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p linkauth-lifecycle --features failpoints --test failpoint_tests
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use linkauth_authn::{AuthState, AuthStateConfig, testutil::FixedCredentials};
use linkauth_lifecycle::{
    LifecycleConfig, LifecycleController, LifecycleError, Session, SessionEvent, SessionFactory,
};
use linkauth_storage::{BoxError, MemoryBackend, RetryConfig};
use tokio::sync::mpsc;

#[derive(Default)]
struct CountingSessions {
    connects: AtomicUsize,
}

#[async_trait]
impl SessionFactory for CountingSessions {
    async fn connect(
        &self,
        _auth: AuthState,
        _events: mpsc::Sender<SessionEvent>,
    ) -> Result<Box<dyn Session>, BoxError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Err(Arc::new(std::io::Error::other("not reached")))
    }
}

fn controller(sessions: Arc<CountingSessions>) -> LifecycleController {
    let auth = AuthStateConfig::builder()
        .identity_key("fp")
        .retry(RetryConfig::disabled())
        .build()
        .expect("valid auth config");
    LifecycleController::builder()
        .config(LifecycleConfig::builder().auth(auth).build().expect("valid config"))
        .backend(Arc::new(MemoryBackend::new()))
        .credentials(Arc::new(FixedCredentials::new(1)))
        .sessions(sessions)
        .build()
}

#[tokio::test]
async fn connect_failpoint_stops_before_factory() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("lifecycle-before-connect", "return").expect("failed to configure fail point");

    let sessions = Arc::new(CountingSessions::default());
    let result = controller(Arc::clone(&sessions)).run().await;

    assert!(matches!(result, Err(LifecycleError::Session { .. })), "got {result:?}");
    assert_eq!(sessions.connects.load(Ordering::SeqCst), 0);

    scenario.teardown();
}

#[tokio::test]
async fn bootstrap_load_failpoint_surfaces_auth_error() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("memory-load", "return").expect("failed to configure fail point");

    let sessions = Arc::new(CountingSessions::default());
    let result = controller(Arc::clone(&sessions)).run().await;

    assert!(matches!(result, Err(LifecycleError::Auth(_))), "got {result:?}");
    assert_eq!(sessions.connects.load(Ordering::SeqCst), 0);

    scenario.teardown();
}
