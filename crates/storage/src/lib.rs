//! Persistence adapter abstraction for linked-device auth state.
//!
//! This crate provides the [`StorageBackend`] trait: a durable key-value
//! contract holding one opaque blob per identity key. The auth state layer
//! serializes credentials and key material into that blob and never talks to
//! a concrete store directly; the backend is injected.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Connection lifecycle                        │
//! │        (reconnect / terminate / purge decisions)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  Auth state manager                         │
//! │     (credentials, key-material namespaces, codec)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  linkauth-storage                           │
//! │              StorageBackend trait                           │
//! │             (load, store, delete)                           │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│            FileBackend                       │
//! │   (testing)  │      (one file per identity key)             │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use linkauth_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.store("device-1", r#"{"creds":{},"keys":{}}"#.to_owned()).await?;
//!     assert!(backend.load("device-1").await?.is_some());
//!
//!     backend.delete("device-1").await?;
//!     assert!(backend.load("device-1").await?.is_none());
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables [`testutil`] (fault-injecting backend) and [`conformance`] (adapter
//!   contract suite).
//! - **`failpoints`**: Activates `fail_point!` sites in [`MemoryBackend`] and [`with_retry`].

#![deny(unsafe_code)]

pub mod backend;
pub mod config;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod file;
pub mod memory;
pub mod retry;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use backend::StorageBackend;
pub use config::RetryConfig;
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use retry::with_retry;
