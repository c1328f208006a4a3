//! Ownership of the single active node connection.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy::{eips::BlockNumberOrTag, rpc::types::Log};
use parking_lot::RwLock;
use tokio::time::timeout;

use crate::{
    SupervisorError,
    client::{ClientError, Connection, Connector, Endpoint, EventStream},
    registry::SubscriptionDescriptor,
};

/// Holds at most one live [`Connection`] and delegates calls to it.
///
/// The connection is only replaced through [`open`](Self::open) and released through
/// [`close`](Self::close). Calls clone the connection handle out of the lock before awaiting,
/// so the lock is never held across network I/O.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    active: RwLock<Option<Active<C::Connection>>>,
    epoch: AtomicU64,
    call_timeout: Duration,
}

struct Active<T> {
    connection: T,
    endpoint: Endpoint,
}

impl<C: Connector> ConnectionManager<C> {
    pub(crate) fn new(connector: C, call_timeout: Duration) -> Self {
        Self { connector, active: RwLock::new(None), epoch: AtomicU64::new(0), call_timeout }
    }

    /// Connect to `endpoint` and make it the active connection.
    ///
    /// Returns the new connection epoch.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Connection`] if connecting fails or exceeds the call timeout.
    /// The previous connection, if any, is left in place.
    pub async fn open(&self, endpoint: &Endpoint) -> Result<u64, SupervisorError> {
        debug!(endpoint = %endpoint, "Connecting");

        let connection = timeout(self.call_timeout, self.connector.connect(endpoint))
            .await
            .map_err(ClientError::from)
            .and_then(|result| result)
            .map_err(SupervisorError::Connection)?;

        *self.active.write() = Some(Active { connection, endpoint: endpoint.clone() });
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        info!(endpoint = %endpoint, epoch = epoch, "Connection opened");
        Ok(epoch)
    }

    /// Release the active connection. Returns `false` if there was none.
    pub fn close(&self) -> bool {
        match self.active.write().take() {
            Some(active) => {
                info!(endpoint = %active.endpoint, "Connection closed");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.active.read().is_some()
    }

    /// Number of connections opened so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Endpoint of the active connection.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.active.read().as_ref().map(|active| active.endpoint.clone())
    }

    fn current(&self) -> Result<C::Connection, SupervisorError> {
        self.active
            .read()
            .as_ref()
            .map(|active| active.connection.clone())
            .ok_or(SupervisorError::NotConnected)
    }

    /// Open a live stream for `descriptor` on the active connection.
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::NotConnected`] if there is no active connection.
    /// * [`SupervisorError::Subscribe`] if the node refuses or the call times out.
    pub async fn subscribe(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> Result<EventStream, SupervisorError> {
        let connection = self.current()?;
        timeout(self.call_timeout, connection.subscribe(descriptor))
            .await
            .map_err(ClientError::from)
            .and_then(|result| result)
            .map_err(SupervisorError::Subscribe)
    }

    /// Fetch past events for `descriptor` on the active connection.
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::NotConnected`] if there is no active connection.
    /// * [`SupervisorError::Fetch`] if the query fails or times out.
    pub async fn get_past_events(
        &self,
        descriptor: &SubscriptionDescriptor,
        from_block: u64,
        to_block: BlockNumberOrTag,
    ) -> Result<Vec<Log>, SupervisorError> {
        let connection = self.current()?;
        timeout(self.call_timeout, connection.get_past_events(descriptor, from_block, to_block))
            .await
            .map_err(ClientError::from)
            .and_then(|result| result)
            .map_err(SupervisorError::Fetch)
    }
}
