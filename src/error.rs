use std::mem::discriminant;

use thiserror::Error;

use crate::client::ClientError;

/// Errors returned by the [`Supervisor`](crate::Supervisor).
///
/// Configuration and request errors are returned synchronously to the caller. Errors that
/// happen inside background tasks (stream errors, reconciliation fetch failures) are logged
/// and routed to a reset instead; they only surface here through
/// [`Supervisor::reset_connection`](crate::Supervisor::reset_connection).
#[derive(Error, Debug, Clone)]
pub enum SupervisorError {
    /// The caller supplied an invalid configuration, e.g. an empty provider list.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A listen request is missing a required field.
    #[error("Invalid request: {0} is required")]
    InvalidRequest(&'static str),

    /// No providers have been configured.
    #[error("No providers configured")]
    NotConfigured,

    /// The supervisor has no open connection yet.
    #[error("Connection not initialized")]
    NotReady,

    /// An operation needed the active connection but there is none.
    #[error("Not connected")]
    NotConnected,

    /// Connecting to a provider failed.
    #[error("Connection error: {0}")]
    Connection(#[source] ClientError),

    /// Opening a live subscription failed.
    #[error("Subscribe error: {0}")]
    Subscribe(#[source] ClientError),

    /// Fetching past events failed.
    #[error("Fetch error: {0}")]
    Fetch(#[source] ClientError),

    /// A live subscription reported an error.
    #[error("Stream error: {0}")]
    Stream(#[source] ClientError),

    /// A reset could not reach any provider. The supervisor stays disconnected until
    /// [`init_connection`](crate::Supervisor::init_connection) or
    /// [`reset_connection`](crate::Supervisor::reset_connection) is called again.
    #[error("Disconnected: {0}")]
    Disconnected(#[source] ClientError),
}

impl SupervisorError {
    /// Returns `true` if both errors are the same variant, ignoring payloads.
    #[must_use]
    pub fn same_kind(&self, other: &SupervisorError) -> bool {
        discriminant(self) == discriminant(other)
    }
}

impl PartialEq<SupervisorError> for Result<(), SupervisorError> {
    fn eq(&self, other: &SupervisorError) -> bool {
        match self {
            Ok(()) => false,
            Err(err) => err.same_kind(other),
        }
    }
}
