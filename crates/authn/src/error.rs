//! Auth state error types.
//!
//! This module defines errors that can occur while loading, mutating and
//! persisting credentials and key material.

use linkauth_storage::StorageError;
use thiserror::Error;

use crate::codec::CodecError;

/// Result type alias for auth state operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Auth state errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Persisted or supplied state could not be decoded.
    ///
    /// Bootstrap recovers from this locally by initializing fresh
    /// credentials; everywhere else it is surfaced.
    #[error("Cannot decode auth state: {0}")]
    Decode(#[source] CodecError),

    /// In-memory state could not be encoded into a blob.
    #[error("Cannot encode auth state: {0}")]
    Encode(#[source] CodecError),

    /// The backing store could not be reached on load, store or delete.
    ///
    /// Wraps the original [`StorageError`] to preserve the full error source
    /// chain. A key-material `set` that cannot be persisted returns this
    /// rather than dropping the write.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(#[source] StorageError),

    /// A logical key type or namespace name outside the fixed map.
    #[error("Unknown key type: {0}")]
    UnknownKeyType(String),
}

impl AuthError {
    /// Creates an `UnknownKeyType` error.
    #[must_use]
    pub fn unknown_key_type(name: impl Into<String>) -> Self {
        Self::UnknownKeyType(name.into())
    }

    /// Returns `true` if this error came from the backing store.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::PersistenceUnavailable(_))
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::PersistenceUnavailable(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn storage_errors_become_persistence_unavailable() {
        let err: AuthError = StorageError::connection("redis down").into();
        assert!(err.is_persistence());
        assert_eq!(err.to_string(), "Persistence unavailable: Connection error: redis down");
        assert!(err.source().is_some());
    }

    #[test]
    fn unknown_key_type_display() {
        let err = AuthError::unknown_key_type("identity-key");
        assert_eq!(err.to_string(), "Unknown key type: identity-key");
        assert!(!err.is_persistence());
    }
}
