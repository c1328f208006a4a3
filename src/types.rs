use std::fmt;

use crate::{client::Endpoint, registry::SubscriptionKey};

/// Lifecycle state of the [`Supervisor`](crate::Supervisor).
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorStatus {
    /// No connection has been opened, or it was cleared.
    Uninitialized,
    /// Connected, no live subscriptions.
    Ready,
    /// Connected with at least one live subscription.
    Active,
    /// Tearing down and rebuilding the connection.
    Resetting,
    /// A reset exhausted its connection attempts.
    Disconnected,
}

impl SupervisorStatus {
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, SupervisorStatus::Ready | SupervisorStatus::Active)
    }
}

/// Why a reset was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    /// Requested through [`Supervisor::reset_connection`](crate::Supervisor::reset_connection).
    Manual,
    /// A subscription went silent past its keep-alive timeout.
    KeepAliveTimeout(SubscriptionKey),
    /// A live stream reported an error or ended.
    StreamError(SubscriptionKey),
    /// A live stream could not be opened.
    SubscribeFailed(SubscriptionKey),
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::Manual => f.write_str("manual"),
            ResetReason::KeepAliveTimeout(key) => write!(f, "keep-alive timeout on {key}"),
            ResetReason::StreamError(key) => write!(f, "stream error on {key}"),
            ResetReason::SubscribeFailed(key) => write!(f, "subscribe failed on {key}"),
        }
    }
}

/// Significant transitions, broadcast to every
/// [`Supervisor::notifications`](crate::Supervisor::notifications) receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A connection to `endpoint` was opened.
    Connected { endpoint: Endpoint },
    /// A live stream was opened for `key`.
    Subscribed { key: SubscriptionKey, generation: u64 },
    /// A reset began; `generation` is the new generation.
    ResetStarted { generation: u64, reason: ResetReason },
    /// The provider cursor moved to `endpoint`.
    ProviderRotated { endpoint: Endpoint },
    /// A reset finished and `replayed` of `registered` subscriptions were re-established.
    ResetCompleted { generation: u64, replayed: usize, registered: usize },
    /// No provider could be reached; the supervisor is disconnected.
    Disconnected,
    /// History reconciliation for `key` failed `consecutive_failures` times in a row.
    ReconcileStalled { key: SubscriptionKey, consecutive_failures: usize },
}
