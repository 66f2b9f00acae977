//! Events a session reports to the controller.

use std::fmt;

use linkauth_authn::AuthenticationCreds;
use serde::{Deserialize, Serialize};

/// One event emitted by a running session.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SessionEvent {
    /// The session changed the credential record; it must be persisted.
    CredentialsUpdated(AuthenticationCreds),
    /// The connection changed state.
    ConnectionUpdate {
        /// New connection state.
        state: ConnectionState,
        /// Why the connection closed; only meaningful with
        /// [`ConnectionState::Closed`].
        last_disconnect: Option<DisconnectInfo>,
    },
    /// Messages arrived. Only logged.
    MessagesUpsert(serde_json::Value),
}

impl SessionEvent {
    /// A `ConnectionUpdate` without disconnect details.
    #[must_use]
    pub fn connection(state: ConnectionState) -> Self {
        Self::ConnectionUpdate { state, last_disconnect: None }
    }

    /// A `ConnectionUpdate` to [`ConnectionState::Closed`].
    #[must_use]
    pub fn closed(info: DisconnectInfo) -> Self {
        Self::ConnectionUpdate { state: ConnectionState::Closed, last_disconnect: Some(info) }
    }
}

/// Connection state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Authenticated and ready.
    Open,
    /// Closed; the session will emit nothing further.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if a session may move from `self` to `next`.
    ///
    /// Valid moves are `Connecting → Open`, `Connecting → Closed` and
    /// `Open → Closed`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open | Self::Closed) | (Self::Open, Self::Closed)
        )
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of a closed connection.
///
/// `data` is the raw error payload of the close; the controller looks for a
/// `device_removed` marker in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectInfo {
    /// Status code of the close, when the session reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Structured payload of the close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl DisconnectInfo {
    /// Info carrying only a status code.
    #[must_use]
    pub fn with_status(status_code: u16) -> Self {
        Self { status_code: Some(status_code), data: None }
    }

    /// The named reason for [`status_code`](Self::status_code), if known.
    #[must_use]
    pub fn reason(&self) -> Option<DisconnectReason> {
        self.status_code.and_then(DisconnectReason::from_code)
    }
}

/// Known close status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// 428: the server closed the connection.
    ConnectionClosed,
    /// 408: the connection was lost or timed out.
    ConnectionLost,
    /// 411: device list mismatch.
    MultideviceMismatch,
    /// 440: another client took over this session.
    ConnectionReplaced,
    /// 401: the device was logged out.
    LoggedOut,
    /// 500: the stored session is unusable.
    BadSession,
    /// 515: the server asked for a restart.
    RestartRequired,
}

impl DisconnectReason {
    /// Every known reason.
    pub const ALL: [Self; 7] = [
        Self::ConnectionClosed,
        Self::ConnectionLost,
        Self::MultideviceMismatch,
        Self::ConnectionReplaced,
        Self::LoggedOut,
        Self::BadSession,
        Self::RestartRequired,
    ];

    /// Status code of this reason.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::ConnectionClosed => 428,
            Self::ConnectionLost => 408,
            Self::MultideviceMismatch => 411,
            Self::ConnectionReplaced => 440,
            Self::LoggedOut => 401,
            Self::BadSession => 500,
            Self::RestartRequired => 515,
        }
    }

    /// Reason for a status code.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.code() == code)
    }

    /// Name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionClosed => "connectionClosed",
            Self::ConnectionLost => "connectionLost",
            Self::MultideviceMismatch => "multideviceMismatch",
            Self::ConnectionReplaced => "connectionReplaced",
            Self::LoggedOut => "loggedOut",
            Self::BadSession => "badSession",
            Self::RestartRequired => "restartRequired",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn valid_transitions() {
        use ConnectionState::*;
        assert!(Connecting.can_transition_to(Open));
        assert!(Connecting.can_transition_to(Closed));
        assert!(Open.can_transition_to(Closed));
    }

    #[test]
    fn invalid_transitions() {
        use ConnectionState::*;
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Open.can_transition_to(Open));
        assert!(!Connecting.can_transition_to(Connecting));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Closed.can_transition_to(Connecting));
        assert!(!Closed.can_transition_to(Closed));
    }

    #[test]
    fn reason_codes_roundtrip() {
        for reason in DisconnectReason::ALL {
            assert_eq!(DisconnectReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(DisconnectReason::from_code(401), Some(DisconnectReason::LoggedOut));
        assert_eq!(DisconnectReason::from_code(999), None);
    }

    #[test]
    fn timed_out_shares_the_lost_code() {
        assert_eq!(DisconnectInfo::with_status(408).reason(), Some(DisconnectReason::ConnectionLost));
    }

    #[test]
    fn disconnect_info_deserializes_camel_case() {
        let info: DisconnectInfo =
            serde_json::from_value(json!({ "statusCode": 401, "data": { "content": [] } })).unwrap();
        assert_eq!(info.status_code, Some(401));
        assert_eq!(info.reason(), Some(DisconnectReason::LoggedOut));
        assert!(info.data.is_some());
    }
}
