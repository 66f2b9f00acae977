//! # linkauth lifecycle
//!
//! Keeps a linked-device session alive. The [`LifecycleController`] loads
//! auth state, starts a session through a [`SessionFactory`], persists the
//! credential updates the session reports and, when the connection closes,
//! decides between reconnecting, stopping, and stopping with the stored state
//! purged.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use linkauth_authn::{AuthStateConfig, CredentialsFactory};
//! use linkauth_lifecycle::{ConnectionState, LifecycleConfig, LifecycleController, SessionFactory};
//! use linkauth_storage::FileBackend;
//!
//! # async fn example(
//! #     credentials: Arc<dyn CredentialsFactory>,
//! #     sessions: Arc<dyn SessionFactory>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = LifecycleConfig::builder()
//!     .auth(AuthStateConfig::builder().identity_key("primary").build()?)
//!     .build()?;
//! let controller = LifecycleController::builder()
//!     .config(config)
//!     .backend(Arc::new(FileBackend::open("./auth-state").await?))
//!     .credentials(credentials)
//!     .sessions(sessions)
//!     .build();
//!
//! let mut state = controller.subscribe();
//! let run = tokio::spawn(controller.run());
//! state.wait_for(|s| *s == ConnectionState::Open).await?;
//! println!("connection ready");
//!
//! let decision = run.await??;
//! println!("stopped: {decision:?}");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Disconnect classification.
pub mod classify;
/// The lifecycle controller.
pub mod controller;
/// Lifecycle error types.
pub mod error;
/// Session events.
pub mod event;
/// Reconnect pacing.
pub mod policy;
/// Session engine boundary.
pub mod session;

pub use classify::{DEVICE_REMOVED, Decision, classify, is_device_removed};
pub use controller::{DEFAULT_EVENT_BUFFER, LifecycleConfig, LifecycleController};
pub use error::{LifecycleError, Result};
pub use event::{ConnectionState, DisconnectInfo, DisconnectReason, SessionEvent};
pub use policy::ReconnectPolicy;
pub use session::{Session, SessionFactory};
