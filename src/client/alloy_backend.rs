use std::marker::PhantomData;

use alloy::{
    eips::BlockNumberOrTag,
    network::{Ethereum, Network},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
};
use tokio_stream::StreamExt;

use crate::{
    client::{ClientError, Connection, Connector, Endpoint, EventStream, StreamEvent},
    registry::SubscriptionDescriptor,
};

/// [`Connector`] that opens Alloy [`RootProvider`]s.
///
/// Any URL scheme understood by [`RootProvider::connect`] works for history reconciliation,
/// but live streams need a pubsub transport (`ws://`, `wss://` or IPC).
pub struct AlloyConnector<N: Network = Ethereum> {
    _network: PhantomData<fn() -> N>,
}

impl<N: Network> AlloyConnector<N> {
    #[must_use]
    pub fn new() -> Self {
        Self { _network: PhantomData }
    }
}

impl<N: Network> Default for AlloyConnector<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Network> Clone for AlloyConnector<N> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<N: Network> std::fmt::Debug for AlloyConnector<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyConnector").finish()
    }
}

impl<N: Network> Connector for AlloyConnector<N> {
    type Connection = RootProvider<N>;

    async fn connect(&self, endpoint: &Endpoint) -> Result<RootProvider<N>, ClientError> {
        Ok(RootProvider::connect(endpoint.as_str()).await?)
    }
}

impl<N: Network> Connection for RootProvider<N> {
    async fn subscribe(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> Result<EventStream, ClientError> {
        let filter = event_filter(descriptor)?;
        let subscription = self.subscribe_logs(&filter).await?;

        let events = subscription.into_stream().map(|log| {
            if log.removed { StreamEvent::Changed(log) } else { StreamEvent::Data(log) }
        });

        let stream = tokio_stream::once(StreamEvent::Connected)
            .chain(events)
            .chain(tokio_stream::once(StreamEvent::Error(ClientError::SubscriptionClosed)));

        Ok(Box::pin(stream))
    }

    async fn get_past_events(
        &self,
        descriptor: &SubscriptionDescriptor,
        from_block: u64,
        to_block: BlockNumberOrTag,
    ) -> Result<Vec<Log>, ClientError> {
        let filter = event_filter(descriptor)?.from_block(from_block).to_block(to_block);
        Ok(self.get_logs(&filter).await?)
    }
}

/// Build the log filter for `descriptor`: its base filter narrowed to the contract address
/// and the selector of the named ABI event.
pub(crate) fn event_filter(descriptor: &SubscriptionDescriptor) -> Result<Filter, ClientError> {
    let selector = descriptor
        .abi()
        .event(descriptor.event())
        .and_then(|overloads| overloads.first())
        .map(alloy::json_abi::Event::selector)
        .ok_or_else(|| ClientError::UnknownEvent(descriptor.event().to_owned()))?;

    Ok(descriptor.filter().clone().address(descriptor.address()).event_signature(selector))
}
