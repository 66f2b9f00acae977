//! Lifecycle error types.

use linkauth_authn::AuthError;
use linkauth_storage::BoxError;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors that stop the lifecycle controller.
///
/// Disconnects are not errors: they are classified and acted upon. Only
/// failures that leave the controller unable to continue end up here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// Auth state could not be loaded or cleared.
    #[error("Auth state error: {0}")]
    Auth(#[from] AuthError),

    /// The session factory failed to start a session.
    #[error("Session failed to start: {message}")]
    Session {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },
}

impl LifecycleError {
    /// Creates a `Session` error.
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session { message: message.into(), source: None }
    }

    /// Creates a `Session` error wrapping the factory's error.
    #[must_use]
    pub fn session_with_source(message: impl Into<String>, source: BoxError) -> Self {
        Self::Session { message: message.into(), source: Some(source) }
    }
}
