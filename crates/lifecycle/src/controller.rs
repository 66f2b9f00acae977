//! The connection lifecycle controller.
//!
//! One controller drives one identity through a chain of sessions:
//!
//! ```text
//!          ┌────────────────────────────────────────────────────┐
//!          ▼                                                    │
//!   bootstrap auth state ──► connect session ──► drain events   │
//!                                                    │          │
//!                                       Closed / channel gone   │
//!                                                    │          │
//!                                               classify ── Reconnect
//!                                                    │
//!                                    Terminate / TerminateAndPurge
//! ```
//!
//! Credential updates are persisted as they arrive, including any still
//! queued behind the close event. Reaching
//! [`ConnectionState::Open`] is published on a watch channel and resets
//! reconnect backoff.

use std::sync::Arc;

use fail::fail_point;
use linkauth_authn::{AuthStateConfig, AuthStateManager, CredentialsFactory};
use linkauth_storage::{ConfigError, StorageBackend};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::{
    classify::{Decision, classify},
    error::{LifecycleError, Result},
    event::{ConnectionState, DisconnectInfo, SessionEvent},
    policy::{Backoff, ReconnectPolicy},
    session::SessionFactory,
};

/// Default capacity of the per-session event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Configuration for a [`LifecycleController`].
///
/// ```
/// use linkauth_lifecycle::LifecycleConfig;
///
/// let config: LifecycleConfig = serde_json::from_str(
///     r#"{
///         "auth": { "identity_key": "primary" },
///         "reconnect": { "initial_backoff": "1s", "max_backoff": "1m" }
///     }"#,
/// )?;
/// assert_eq!(config.auth().identity_key(), "primary");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLifecycleConfig")]
pub struct LifecycleConfig {
    auth: AuthStateConfig,
    reconnect: ReconnectPolicy,
    event_buffer: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLifecycleConfig {
    auth: AuthStateConfig,
    #[serde(default)]
    reconnect: ReconnectPolicy,
    #[serde(default = "default_event_buffer")]
    event_buffer: usize,
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl TryFrom<RawLifecycleConfig> for LifecycleConfig {
    type Error = ConfigError;

    fn try_from(raw: RawLifecycleConfig) -> std::result::Result<Self, ConfigError> {
        Self::builder()
            .auth(raw.auth)
            .reconnect(raw.reconnect)
            .event_buffer(raw.event_buffer)
            .build()
    }
}

#[bon::bon]
impl LifecycleConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `event_buffer` is zero.
    #[builder]
    pub fn new(
        auth: AuthStateConfig,
        #[builder(default)] reconnect: ReconnectPolicy,
        #[builder(default = DEFAULT_EVENT_BUFFER)] event_buffer: usize,
    ) -> std::result::Result<Self, ConfigError> {
        if event_buffer == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "event_buffer",
                min: "1".into(),
                value: "0".into(),
            });
        }
        Ok(Self { auth, reconnect, event_buffer })
    }

    /// Auth state settings.
    #[must_use]
    pub fn auth(&self) -> &AuthStateConfig {
        &self.auth
    }

    /// Reconnect pacing.
    #[must_use]
    pub fn reconnect(&self) -> ReconnectPolicy {
        self.reconnect
    }

    /// Capacity of each session's event channel.
    #[must_use]
    pub fn event_buffer(&self) -> usize {
        self.event_buffer
    }
}

/// Keeps one identity connected until it is logged out.
pub struct LifecycleController {
    config: LifecycleConfig,
    backend: Arc<dyn StorageBackend>,
    credentials: Arc<dyn CredentialsFactory>,
    sessions: Arc<dyn SessionFactory>,
    state_tx: watch::Sender<ConnectionState>,
}

#[bon::bon]
impl LifecycleController {
    /// Creates a controller. Nothing happens until [`run`](Self::run).
    #[builder]
    pub fn new(
        config: LifecycleConfig,
        backend: Arc<dyn StorageBackend>,
        credentials: Arc<dyn CredentialsFactory>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self { config, backend, credentials, sessions, state_tx }
    }

    /// Watches the connection state of the current session.
    ///
    /// Observers waiting for readiness can use
    /// `rx.wait_for(|state| *state == ConnectionState::Open)`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Runs sessions until one closes with a terminal decision.
    ///
    /// Returns [`Decision::Terminate`] or [`Decision::TerminateAndPurge`];
    /// in the latter case the stored state has been deleted.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Auth`] if auth state cannot be loaded or cleared
    /// - [`LifecycleError::Session`] if the factory cannot start a session
    #[tracing::instrument(skip_all, fields(identity_key = %self.config.auth.identity_key()))]
    pub async fn run(self) -> Result<Decision> {
        let mut backoff = Backoff::new(self.config.reconnect);
        loop {
            let manager = AuthStateManager::bootstrap(
                self.config.auth.clone(),
                Arc::clone(&self.backend),
                &*self.credentials,
            )
            .await?;

            let (events_tx, mut events) = mpsc::channel(self.config.event_buffer);
            self.state_tx.send_replace(ConnectionState::Connecting);

            fail_point!("lifecycle-before-connect", |_| {
                Err(LifecycleError::session("injected failure before connect"))
            });
            let mut session = self.sessions.connect(manager.state(), events_tx).await.map_err(
                |err| LifecycleError::session_with_source("session factory failed", err),
            )?;

            let decision = self.drive(&manager, &mut events, &mut backoff).await;
            session.end().await;

            match decision {
                Decision::Reconnect => {
                    let delay = backoff.next_delay();
                    tracing::info!(attempt = backoff.attempt(), ?delay, "reconnecting");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                },
                Decision::Terminate => {
                    tracing::info!("logged out, stopping");
                    return Ok(decision);
                },
                Decision::TerminateAndPurge => {
                    manager.clear_state().await?;
                    tracing::info!("device removed, stored state purged");
                    return Ok(decision);
                },
            }
        }
    }

    /// Consumes one session's events until it closes.
    async fn drive(
        &self,
        manager: &AuthStateManager,
        events: &mut mpsc::Receiver<SessionEvent>,
        backoff: &mut Backoff,
    ) -> Decision {
        let mut current = ConnectionState::Connecting;

        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::CredentialsUpdated(creds) => {
                    if let Err(err) = manager.update_creds(creds).await {
                        tracing::error!(error = %err, "failed to persist updated credentials");
                    }
                },
                SessionEvent::ConnectionUpdate { state, last_disconnect } => {
                    if !current.can_transition_to(state) {
                        tracing::warn!(from = %current, to = %state, "ignoring invalid transition");
                        continue;
                    }
                    current = state;
                    self.state_tx.send_replace(state);

                    match state {
                        ConnectionState::Open => {
                            backoff.reset();
                            tracing::info!("connection open");
                        },
                        ConnectionState::Closed => {
                            persist_queued_creds(manager, events).await;
                            return closed(last_disconnect.as_ref());
                        },
                        ConnectionState::Connecting => {},
                    }
                },
                SessionEvent::MessagesUpsert(payload) => {
                    let count = payload
                        .get("messages")
                        .and_then(serde_json::Value::as_array)
                        .map_or(0, Vec::len);
                    tracing::debug!(count, "messages upserted");
                },
            }
        }

        tracing::warn!("session dropped its event channel");
        self.state_tx.send_replace(ConnectionState::Closed);
        Decision::Reconnect
    }
}

/// Saves credential updates the session queued behind its close event.
async fn persist_queued_creds(
    manager: &AuthStateManager,
    events: &mut mpsc::Receiver<SessionEvent>,
) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::CredentialsUpdated(creds) => {
                if let Err(err) = manager.update_creds(creds).await {
                    tracing::error!(error = %err, "failed to persist updated credentials");
                }
            },
            other => tracing::debug!(event = ?other, "dropping event queued after close"),
        }
    }
}

fn closed(last_disconnect: Option<&DisconnectInfo>) -> Decision {
    let decision = classify(last_disconnect);
    let status_code = last_disconnect.and_then(|info| info.status_code);
    let reason = last_disconnect.and_then(DisconnectInfo::reason).map(|r| r.as_str());
    tracing::info!(?status_code, ?reason, ?decision, "connection closed");
    decision
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn auth() -> AuthStateConfig {
        AuthStateConfig::builder().identity_key("id").build().unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = LifecycleConfig::builder().auth(auth()).build().unwrap();
        assert_eq!(config.event_buffer(), DEFAULT_EVENT_BUFFER);
        assert_eq!(config.reconnect(), ReconnectPolicy::immediate());
    }

    #[test]
    fn config_rejects_zero_buffer() {
        let err = LifecycleConfig::builder().auth(auth()).event_buffer(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::BelowMinimum { field: "event_buffer", .. }));
        assert!(
            serde_json::from_str::<LifecycleConfig>(
                r#"{"auth": {"identity_key": "id"}, "event_buffer": 0}"#
            )
            .is_err()
        );
    }
}
