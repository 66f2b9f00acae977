//! Boundary to the external session engine.
//!
//! The engine that speaks the wire protocol lives outside this workspace. It
//! plugs in through [`SessionFactory`]: the controller hands it an
//! [`AuthState`] and an event channel, and gets back a [`Session`] it can
//! tear down.

use async_trait::async_trait;
use linkauth_authn::AuthState;
use linkauth_storage::BoxError;
use tokio::sync::mpsc;

use crate::event::SessionEvent;

/// A running session.
#[async_trait]
pub trait Session: Send {
    /// Stops the session and releases its resources. Called once, after the
    /// session closed or dropped its event channel.
    async fn end(&mut self);
}

/// Starts sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Starts a session authenticated with `auth`.
    ///
    /// The session reports through `events` and signals that it is gone by
    /// sending [`ConnectionState::Closed`](crate::ConnectionState::Closed)
    /// or by dropping the sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be started at all.
    async fn connect(
        &self,
        auth: AuthState,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Box<dyn Session>, BoxError>;
}
