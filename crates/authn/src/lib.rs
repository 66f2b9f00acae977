//! # linkauth authn
//!
//! Credentials and key material of a linked-device messaging session, kept
//! durable through a [`StorageBackend`](linkauth_storage::StorageBackend).
//!
//! This crate provides:
//! - **Codec**: pretty JSON with lossless, tagged binary payloads
//! - **Key material**: six namespaced key types with typed values
//! - **Auth state**: bootstrap, merge-only writes and full-blob saves
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use linkauth_authn::{AuthStateConfig, AuthStateManager, Buffer, KeyBatch, KeyMaterial, KeyType};
//! use linkauth_storage::MemoryBackend;
//!
//! # async fn example(
//! #     factory: &dyn linkauth_authn::CredentialsFactory,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthStateConfig::builder().identity_key("primary").build()?;
//! let manager = AuthStateManager::bootstrap(config, Arc::new(MemoryBackend::new()), factory).await?;
//!
//! let mut batch = KeyBatch::new();
//! batch.insert("abc", KeyMaterial::SenderKey(Buffer::from([7u8; 10])));
//! manager.set(batch).await?;
//!
//! let found = manager.get(KeyType::SenderKey, ["abc"]);
//! assert_eq!(found["abc"].as_buffer().map(|b| b.len()), Some(10));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Text codec and binary payloads.
pub mod codec;
/// Credential record.
pub mod creds;
/// Auth state error types.
pub mod error;
/// Key types and key-material values.
pub mod keys;
/// Persisted auth state.
pub mod state;
/// In-memory key-material store.
pub mod store;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use codec::{Buffer, CodecError};
pub use creds::{AuthenticationCreds, CredentialsFactory, SignedKeyPair};
pub use error::{AuthError, Result};
pub use keys::{
    AppStateSyncKeyData, AppStateSyncKeyFingerprint, KeyBatch, KeyMaterial, KeyPair, KeyType,
    LtHashState, ValueMac,
};
pub use state::{AuthState, AuthStateConfig, AuthStateManager, SignalKeyStore};
pub use store::KeyMaterialStore;
