//! Event-Supervisor keeps EVM event subscriptions alive across unreliable node connections.
//!
//! The main entry point is [`Supervisor`], built via [`SupervisorBuilder`] over a
//! [`client::Connector`] (usually [`AlloyConnector`]).
//!
//! After setting providers and calling [`Supervisor::init_connection`], register subscriptions
//! with [`Supervisor::listen`]. Each [`ListenRequest`] names a contract address, an event from
//! the contract's ABI and the callbacks that receive its records.
//!
//! # Failover
//!
//! Providers are equivalent endpoints of the same chain. When a subscription's stream fails, or
//! when it stays silent past its keep-alive timeout, the supervisor resets: every live
//! subscription and timer is torn down, the next provider is tried (with bounded exponential
//! backoff) and every registered subscription is replayed on the new connection. The registry
//! survives resets, so callers never re-register.
//!
//! If no provider can be reached the supervisor enters [`SupervisorStatus::Disconnected`] and
//! waits for [`Supervisor::init_connection`].
//!
//! # History reconciliation
//!
//! Streams can miss records around a reset. A request with a history callback also polls past
//! events from its last checkpoint to `latest` on a fixed interval. Records at the checkpoint
//! block may be delivered again; consumers should deduplicate, for example by transaction hash
//! and log index.
//!
//! # Notifications
//!
//! [`Supervisor::notifications`] yields a [`Notification`] for every lifecycle transition:
//! connects, subscriptions, resets, provider rotations and stalled reconciliation.

#[macro_use]
mod logging;

pub mod client;
pub mod connection;
pub mod provider_pool;
pub mod registry;
pub mod supervisor;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod error;
mod types;

pub use client::{AlloyConnector, ClientError, Endpoint, StreamEvent};
pub use error::SupervisorError;
pub use registry::{SubscriptionDescriptor, SubscriptionKey};
pub use supervisor::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_FETCH_FAILURE_THRESHOLD, DEFAULT_HISTORY_INTERVAL,
    DEFAULT_MAX_RESET_RETRIES, DEFAULT_MIN_DELAY, DEFAULT_NOTIFICATION_CAPACITY, ListenRequest,
    Supervisor, SupervisorBuilder,
};
pub use types::{Notification, ResetReason, SupervisorStatus};
