//! Reconnect pacing.
//!
//! The default policy reconnects immediately, every time. A non-zero
//! `initial_backoff` enables exponential backoff:
//! `min(initial_backoff * 2^attempt, max_backoff)`, where `attempt` counts
//! reconnects since the last time a session reached
//! [`Open`](crate::ConnectionState::Open). There is no retry limit.

use std::time::Duration;

use linkauth_storage::ConfigError;
use serde::{Deserialize, Serialize};

/// Default delay cap once backoff is enabled.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How long to wait before each reconnect.
///
/// ```
/// use std::time::Duration;
/// use linkauth_lifecycle::ReconnectPolicy;
///
/// let policy = ReconnectPolicy::builder()
///     .initial_backoff(Duration::from_millis(500))
///     .max_backoff(Duration::from_secs(30))
///     .build()?;
/// assert_eq!(policy.delay(0), Duration::from_millis(500));
/// assert_eq!(policy.delay(10), Duration::from_secs(30));
///
/// assert_eq!(ReconnectPolicy::default().delay(10), Duration::ZERO);
/// # Ok::<(), linkauth_storage::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReconnectPolicy")]
pub struct ReconnectPolicy {
    #[serde(with = "humantime_serde")]
    initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    max_backoff: Duration,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReconnectPolicy {
    #[serde(with = "humantime_serde", default)]
    initial_backoff: Duration,
    #[serde(with = "humantime_serde", default = "default_max_backoff")]
    max_backoff: Duration,
}

fn default_max_backoff() -> Duration {
    DEFAULT_MAX_BACKOFF
}

impl TryFrom<RawReconnectPolicy> for ReconnectPolicy {
    type Error = ConfigError;

    fn try_from(raw: RawReconnectPolicy) -> Result<Self, ConfigError> {
        Self::builder()
            .initial_backoff(raw.initial_backoff)
            .max_backoff(raw.max_backoff)
            .build()
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

#[bon::bon]
impl ReconnectPolicy {
    /// Creates a validated policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `max_backoff` is smaller than
    /// `initial_backoff`.
    #[builder]
    pub fn new(
        #[builder(default)] initial_backoff: Duration,
        #[builder(default = DEFAULT_MAX_BACKOFF)] max_backoff: Duration,
    ) -> Result<Self, ConfigError> {
        if max_backoff < initial_backoff {
            return Err(ConfigError::Invalid {
                field: "max_backoff",
                reason: format!(
                    "{max_backoff:?} is smaller than initial_backoff {initial_backoff:?}"
                ),
            });
        }
        Ok(Self { initial_backoff, max_backoff })
    }

    /// Reconnect at once, forever.
    #[must_use]
    pub fn immediate() -> Self {
        Self { initial_backoff: Duration::ZERO, max_backoff: DEFAULT_MAX_BACKOFF }
    }

    /// Delay before the first reconnect.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Cap on any single delay.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Delay before reconnect number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Attempt counter over a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay for the next reconnect; advances the counter.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}
