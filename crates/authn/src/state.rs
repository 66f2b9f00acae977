//! Durable auth state for one identity.
//!
//! [`AuthStateManager`] owns the credential record and the key-material
//! store of a single identity key and keeps them in one persisted blob.
//!
//! # Architecture
//!
//! ```text
//! session engine ── SignalKeyStore::set(batch) ──► merge into store
//!                                                    │
//!                                   snapshot {creds, keys} (under mutex)
//!                                                    │
//!                                   StorageBackend::store (with_retry)
//! ```
//!
//! # Consistency
//!
//! Every mutation is followed by a full save, and the mutation plus its
//! snapshot happen while holding an async save lock. Saves therefore reach
//! the backend in mutation order, and each one is a superset of the previous
//! in-memory state. A failed store leaves the in-memory merge in place and
//! returns [`AuthError::PersistenceUnavailable`].
//!
//! Only one writer per identity key is supported. Two processes sharing a
//! key race and the last store wins.

use std::{collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
use fail::fail_point;
use linkauth_storage::{ConfigError, RetryConfig, StorageBackend, with_retry};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    creds::{AuthenticationCreds, CredentialsFactory},
    error::{AuthError, Result},
    keys::{KeyBatch, KeyMaterial, KeyType},
    store::KeyMaterialStore,
};

/// Configuration for an [`AuthStateManager`].
///
/// ```
/// use linkauth_authn::AuthStateConfig;
///
/// let config = AuthStateConfig::builder().identity_key("primary").build()?;
/// assert_eq!(config.identity_key(), "primary");
///
/// let parsed: AuthStateConfig =
///     serde_json::from_str(r#"{"identity_key": "primary", "retry": {"max_retries": 1}}"#)?;
/// assert_eq!(parsed.retry().max_retries(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAuthStateConfig")]
pub struct AuthStateConfig {
    identity_key: String,
    retry: RetryConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuthStateConfig {
    identity_key: String,
    #[serde(default)]
    retry: RetryConfig,
}

impl TryFrom<RawAuthStateConfig> for AuthStateConfig {
    type Error = ConfigError;

    fn try_from(raw: RawAuthStateConfig) -> std::result::Result<Self, ConfigError> {
        Self::builder()
            .identity_key(raw.identity_key)
            .retry(raw.retry)
            .build()
    }
}

#[bon::bon]
impl AuthStateConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `identity_key` is empty.
    #[builder]
    pub fn new(
        #[builder(into)] identity_key: String,
        #[builder(default)] retry: RetryConfig,
    ) -> std::result::Result<Self, ConfigError> {
        if identity_key.is_empty() {
            return Err(ConfigError::Invalid {
                field: "identity_key",
                reason: "must not be empty".into(),
            });
        }
        Ok(Self { identity_key, retry })
    }

    /// Key under which the blob is stored.
    #[must_use]
    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    /// Retry policy for backend calls.
    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

/// Shape of the persisted blob.
#[derive(Deserialize)]
struct PersistedState {
    creds: AuthenticationCreds,
    #[serde(default)]
    keys: KeyMaterialStore,
}

#[derive(Serialize)]
struct PersistedStateRef<'a> {
    creds: &'a AuthenticationCreds,
    keys: &'a KeyMaterialStore,
}

/// Key-material access handed to the session engine.
#[async_trait]
pub trait SignalKeyStore: Send + Sync {
    /// Looks up `ids` in `key_type`'s namespace. Absent ids are omitted.
    async fn get(&self, key_type: KeyType, ids: &[String]) -> Result<BTreeMap<String, KeyMaterial>>;

    /// Merges `batch` and persists the full state before returning.
    async fn set(&self, batch: KeyBatch) -> Result<()>;
}

/// What a session needs to authenticate: the credentials and a key store.
#[derive(Clone)]
pub struct AuthState {
    /// Snapshot of the credential record at session start.
    pub creds: AuthenticationCreds,
    /// Live key-material store.
    pub keys: Arc<dyn SignalKeyStore>,
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("registered", &self.creds.registered)
            .field("paired", &self.creds.is_paired())
            .finish_non_exhaustive()
    }
}

struct Inner {
    creds: AuthenticationCreds,
    keys: KeyMaterialStore,
}

impl Inner {
    fn encode(&self) -> Result<String> {
        codec::encode(&PersistedStateRef { creds: &self.creds, keys: &self.keys })
            .map_err(AuthError::Encode)
    }
}

struct Shared {
    identity_key: String,
    retry: RetryConfig,
    backend: Arc<dyn StorageBackend>,
    inner: Mutex<Inner>,
    save_lock: tokio::sync::Mutex<()>,
}

/// Durable credentials and key material for one identity key.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct AuthStateManager {
    shared: Arc<Shared>,
}

impl fmt::Debug for AuthStateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthStateManager")
            .field("identity_key", &self.shared.identity_key)
            .finish_non_exhaustive()
    }
}

impl AuthStateManager {
    /// Loads the state stored under the configured identity key.
    ///
    /// If nothing is stored, or the stored blob does not decode, fresh
    /// credentials come from `factory` and the key store starts empty.
    /// Fresh state is not written until the first save.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PersistenceUnavailable`] if the backend cannot be
    /// read after retries.
    #[tracing::instrument(skip_all, fields(identity_key = %config.identity_key))]
    pub async fn bootstrap(
        config: AuthStateConfig,
        backend: Arc<dyn StorageBackend>,
        factory: &dyn CredentialsFactory,
    ) -> Result<Self> {
        let AuthStateConfig { identity_key, retry } = config;

        let stored = {
            let backend = &*backend;
            let key = identity_key.as_str();
            with_retry(&retry, "load", || backend.load(key)).await?
        };

        let inner = match stored.map(|blob| codec::decode::<PersistedState>(&blob)) {
            Some(Ok(state)) => {
                tracing::debug!(keys = state.keys.len(), "restored auth state");
                Inner { creds: state.creds, keys: state.keys }
            },
            Some(Err(err)) => {
                tracing::warn!(error = %err, "stored auth state is unreadable, starting fresh");
                Inner { creds: factory.init_auth_creds(), keys: KeyMaterialStore::new() }
            },
            None => {
                tracing::info!("no stored auth state, starting fresh");
                Inner { creds: factory.init_auth_creds(), keys: KeyMaterialStore::new() }
            },
        };

        Ok(Self {
            shared: Arc::new(Shared {
                identity_key,
                retry,
                backend,
                inner: Mutex::new(inner),
                save_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// The identity key this manager persists under.
    #[must_use]
    pub fn identity_key(&self) -> &str {
        &self.shared.identity_key
    }

    /// Clone of the current credential record.
    #[must_use]
    pub fn creds(&self) -> AuthenticationCreds {
        self.shared.inner.lock().creds.clone()
    }

    /// Clone of the current key-material store.
    #[must_use]
    pub fn keys(&self) -> KeyMaterialStore {
        self.shared.inner.lock().keys.clone()
    }

    /// Credentials plus a key-store handle for a new session.
    #[must_use]
    pub fn state(&self) -> AuthState {
        AuthState { creds: self.creds(), keys: Arc::new(self.clone()) }
    }

    /// Looks up `ids` in `key_type`'s namespace.
    pub fn get<I, S>(&self, key_type: KeyType, ids: I) -> BTreeMap<String, KeyMaterial>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.shared.inner.lock().keys.get(key_type, ids)
    }

    /// Merges `batch` into the store, then saves the full state.
    ///
    /// # Errors
    ///
    /// - [`AuthError::PersistenceUnavailable`] if the save fails; the merge
    ///   stays applied in memory
    /// - [`AuthError::Encode`] if the state cannot be encoded
    #[tracing::instrument(
        skip_all,
        fields(identity_key = %self.shared.identity_key, count = batch.len())
    )]
    pub async fn set(&self, batch: KeyBatch) -> Result<()> {
        let _guard = self.shared.save_lock.lock().await;
        let blob = {
            let mut inner = self.shared.inner.lock();
            inner.keys.apply(batch);
            inner.encode()?
        };
        self.persist(blob).await
    }

    /// Replaces the credential record, then saves the full state.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    #[tracing::instrument(skip_all, fields(identity_key = %self.shared.identity_key))]
    pub async fn update_creds(&self, creds: AuthenticationCreds) -> Result<()> {
        let _guard = self.shared.save_lock.lock().await;
        let blob = {
            let mut inner = self.shared.inner.lock();
            inner.creds = creds;
            inner.encode()?
        };
        self.persist(blob).await
    }

    /// Writes the current state. Calling it again without changes rewrites
    /// the same blob.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    #[tracing::instrument(skip_all, fields(identity_key = %self.shared.identity_key))]
    pub async fn save_state(&self) -> Result<()> {
        let _guard = self.shared.save_lock.lock().await;
        let blob = self.shared.inner.lock().encode()?;
        self.persist(blob).await
    }

    /// Deletes the stored blob. In-memory state is left untouched, so a
    /// later save writes it back.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PersistenceUnavailable`] if the delete fails.
    #[tracing::instrument(skip_all, fields(identity_key = %self.shared.identity_key))]
    pub async fn clear_state(&self) -> Result<()> {
        let _guard = self.shared.save_lock.lock().await;
        let backend = &*self.shared.backend;
        let key = self.shared.identity_key.as_str();
        with_retry(&self.shared.retry, "delete", || backend.delete(key)).await?;
        tracing::info!("stored auth state cleared");
        Ok(())
    }

    async fn persist(&self, blob: String) -> Result<()> {
        fail_point!("auth-state-before-store", |_| {
            Err(AuthError::PersistenceUnavailable(linkauth_storage::StorageError::internal(
                "injected failure before store",
            )))
        });
        let backend = &*self.shared.backend;
        let key = self.shared.identity_key.as_str();
        let bytes = blob.len();
        with_retry(&self.shared.retry, "store", move || backend.store(key, blob.clone())).await?;
        tracing::debug!(bytes, "auth state saved");
        Ok(())
    }
}

#[async_trait]
impl SignalKeyStore for AuthStateManager {
    async fn get(&self, key_type: KeyType, ids: &[String]) -> Result<BTreeMap<String, KeyMaterial>> {
        Ok(AuthStateManager::get(self, key_type, ids))
    }

    async fn set(&self, batch: KeyBatch) -> Result<()> {
        AuthStateManager::set(self, batch).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn config_rejects_empty_identity_key() {
        let err = AuthStateConfig::builder().identity_key("").build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "identity_key", .. }));
    }

    #[test]
    fn config_defaults_retry() {
        let config = AuthStateConfig::builder().identity_key("id").build().unwrap();
        assert_eq!(config.retry(), &RetryConfig::default());
    }

    #[test]
    fn config_deserializes_humantime_retry() {
        let config: AuthStateConfig = serde_json::from_str(
            r#"{"identity_key": "id", "retry": {"initial_backoff": "10ms", "max_backoff": "1s"}}"#,
        )
        .unwrap();
        assert_eq!(config.retry().initial_backoff(), Duration::from_millis(10));
        assert_eq!(config.retry().max_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn config_deserialize_validates() {
        assert!(serde_json::from_str::<AuthStateConfig>(r#"{"identity_key": ""}"#).is_err());
        assert!(
            serde_json::from_str::<AuthStateConfig>(r#"{"identity_key": "id", "extra": 1}"#)
                .is_err()
        );
    }
}
