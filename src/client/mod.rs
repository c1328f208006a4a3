//! The node-client capabilities the supervisor is built on.
//!
//! The supervisor never talks to a node directly. It goes through two traits:
//!
//! * [`Connector`] establishes a [`Connection`] to one [`Endpoint`].
//! * [`Connection`] opens live event streams and fetches past events.
//!
//! [`AlloyConnector`] implements both on top of Alloy's
//! [`RootProvider`](alloy::providers::RootProvider). Tests use the scripted connector from
//! `test_utils`.
//!
//! # Stream contract
//!
//! An [`EventStream`] is lazy, infinite and not restartable. It yields [`StreamEvent`]s until
//! it reports an [`StreamEvent::Error`] or ends. Dropping the stream releases the remote
//! subscription, there is no separate unsubscribe call.

use std::{fmt, pin::Pin, sync::Arc};

use alloy::{
    eips::BlockNumberOrTag,
    rpc::types::Log,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;
use tokio::time::error::Elapsed;
use tokio_stream::Stream;

use crate::registry::SubscriptionDescriptor;

mod alloy_backend;

pub use alloy_backend::AlloyConnector;

/// Items produced by a live subscription.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The node acknowledged the subscription.
    Connected,
    /// A new event record.
    Data(Log),
    /// A previously delivered record changed, e.g. it was removed by a reorg.
    Changed(Log),
    /// The subscription failed. No further items follow.
    Error(ClientError),
}

/// A boxed stream of [`StreamEvent`]s.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Errors reported by a [`Connector`] or [`Connection`].
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The underlying RPC transport returned an error.
    #[error("RPC error: {0}")]
    Rpc(Arc<RpcError<TransportErrorKind>>),

    /// The call did not complete within the configured call timeout.
    #[error("Operation timed out")]
    Timeout,

    /// The requested event does not exist in the subscription's ABI.
    #[error("Event `{0}` not found in ABI")]
    UnknownEvent(String),

    /// The node closed the subscription.
    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl From<RpcError<TransportErrorKind>> for ClientError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        ClientError::Rpc(Arc::new(error))
    }
}

impl From<Elapsed> for ClientError {
    fn from(_: Elapsed) -> Self {
        ClientError::Timeout
    }
}

/// One node endpoint, usually a `ws://` or `wss://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// Establishes connections to node endpoints.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Connect to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Connection, ClientError>> + Send;
}

/// A live connection to one node.
///
/// Connections are cheap handles: the supervisor clones the active one out of its lock before
/// awaiting any network call.
pub trait Connection: Clone + Send + Sync + 'static {
    /// Open a live stream of `descriptor`'s event.
    ///
    /// # Errors
    ///
    /// Returns an error if the node refuses the subscription.
    fn subscribe(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> impl Future<Output = Result<EventStream, ClientError>> + Send;

    /// Fetch past records of `descriptor`'s event in `[from_block, to_block]`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_past_events(
        &self,
        descriptor: &SubscriptionDescriptor,
        from_block: u64,
        to_block: BlockNumberOrTag,
    ) -> impl Future<Output = Result<Vec<Log>, ClientError>> + Send;
}
