//! A scripted in-memory [`Connector`] for driving the supervisor without a node.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use alloy::{
    eips::BlockNumberOrTag,
    rpc::types::Log,
    transports::TransportErrorKind,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    client::{ClientError, Connection, Connector, Endpoint, EventStream, StreamEvent},
    registry::{SubscriptionDescriptor, SubscriptionKey},
};

/// One recorded `get_past_events` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub endpoint: Endpoint,
    pub key: SubscriptionKey,
    pub from_block: u64,
}

/// One recorded successful `subscribe` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeCall {
    pub endpoint: Endpoint,
    pub key: SubscriptionKey,
}

#[derive(Default)]
struct MockState {
    failing_endpoints: HashSet<Endpoint>,
    hanging_endpoints: HashSet<Endpoint>,
    connect_attempts: Vec<Endpoint>,
    failing_subscriptions: HashSet<SubscriptionKey>,
    subscribe_delays: HashMap<SubscriptionKey, VecDeque<Duration>>,
    subscriptions: Vec<SubscribeCall>,
    // every sender stays alive so replaced streams never end on their own
    streams: HashMap<SubscriptionKey, Vec<mpsc::UnboundedSender<StreamEvent>>>,
    past_events: HashMap<SubscriptionKey, VecDeque<Result<Vec<Log>, ClientError>>>,
    fetch_calls: Vec<FetchCall>,
}

/// Connector whose behaviour is scripted per endpoint and per subscription key.
///
/// Clones share state, so a test keeps one clone to script and inspect while the supervisor
/// owns another.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

/// Connection handed out by [`MockConnector`].
#[derive(Clone)]
pub struct MockConnection {
    endpoint: Endpoint,
    state: Arc<Mutex<MockState>>,
}

enum ConnectBehavior {
    Accept,
    Refuse,
    Hang,
}

/// A transport error like the one a refused websocket handshake produces.
#[must_use]
pub fn transport_error(message: &str) -> ClientError {
    TransportErrorKind::custom_str(message).into()
}

impl MockConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every connection to `endpoint` until [`recover_connect`](Self::recover_connect).
    pub fn fail_connect(&self, endpoint: &str) {
        self.state.lock().failing_endpoints.insert(endpoint.into());
    }

    pub fn recover_connect(&self, endpoint: &str) {
        let endpoint = Endpoint::from(endpoint);
        let mut state = self.state.lock();
        state.failing_endpoints.remove(&endpoint);
        state.hanging_endpoints.remove(&endpoint);
    }

    /// Never complete a connection to `endpoint`.
    pub fn hang_connect(&self, endpoint: &str) {
        self.state.lock().hanging_endpoints.insert(endpoint.into());
    }

    /// Every endpoint a connection was attempted to, in order.
    #[must_use]
    pub fn connect_attempts(&self) -> Vec<Endpoint> {
        self.state.lock().connect_attempts.clone()
    }

    /// Refuse subscriptions for `key` until [`recover_subscribe`](Self::recover_subscribe).
    pub fn fail_subscribe(&self, key: &SubscriptionKey) {
        self.state.lock().failing_subscriptions.insert(key.clone());
    }

    pub fn recover_subscribe(&self, key: &SubscriptionKey) {
        self.state.lock().failing_subscriptions.remove(key);
    }

    /// Hold back the reply to the next `subscribe` for `key` by `delay`.
    ///
    /// The stream is opened before the wait, so a later subscription for the same key becomes
    /// the target of [`emit`](Self::emit) while this one is still pending.
    pub fn delay_subscribe(&self, key: &SubscriptionKey, delay: Duration) {
        self.state.lock().subscribe_delays.entry(key.clone()).or_default().push_back(delay);
    }

    /// Every successful subscription, in order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscribeCall> {
        self.state.lock().subscriptions.clone()
    }

    /// Number of successful subscriptions for `key`.
    #[must_use]
    pub fn subscribe_count(&self, key: &SubscriptionKey) -> usize {
        self.state.lock().subscriptions.iter().filter(|call| &call.key == key).count()
    }

    /// Push `event` into the most recent live stream of `key`.
    ///
    /// Returns `false` if `key` was never subscribed or its latest stream was dropped.
    pub fn emit(&self, key: &SubscriptionKey, event: StreamEvent) -> bool {
        let state = self.state.lock();
        state
            .streams
            .get(key)
            .and_then(|senders| senders.last())
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    /// Queue the result of the next `get_past_events` call for `key`. Without a queued result
    /// the call returns no events.
    pub fn push_past_events(&self, key: &SubscriptionKey, result: Result<Vec<Log>, ClientError>) {
        self.state.lock().past_events.entry(key.clone()).or_default().push_back(result);
    }

    /// Every `get_past_events` call, in order.
    #[must_use]
    pub fn fetch_calls(&self) -> Vec<FetchCall> {
        self.state.lock().fetch_calls.clone()
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<MockConnection, ClientError> {
        let behavior = {
            let mut state = self.state.lock();
            state.connect_attempts.push(endpoint.clone());
            if state.hanging_endpoints.contains(endpoint) {
                ConnectBehavior::Hang
            } else if state.failing_endpoints.contains(endpoint) {
                ConnectBehavior::Refuse
            } else {
                ConnectBehavior::Accept
            }
        };

        match behavior {
            ConnectBehavior::Accept => {
                Ok(MockConnection { endpoint: endpoint.clone(), state: Arc::clone(&self.state) })
            }
            ConnectBehavior::Refuse => Err(transport_error("connection refused")),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }
}

impl Connection for MockConnection {
    async fn subscribe(&self, descriptor: &SubscriptionDescriptor) -> Result<EventStream, ClientError> {
        if descriptor.abi().event(descriptor.event()).is_none_or(Vec::is_empty) {
            return Err(ClientError::UnknownEvent(descriptor.event().to_owned()));
        }

        let key = descriptor.key();
        let (receiver, delay) = {
            let mut state = self.state.lock();
            if state.failing_subscriptions.contains(&key) {
                return Err(transport_error("subscription refused"));
            }

            let (sender, receiver) = mpsc::unbounded_channel();
            // receiver is alive, send cannot fail
            let _ = sender.send(StreamEvent::Connected);
            state.streams.entry(key.clone()).or_default().push(sender);
            state
                .subscriptions
                .push(SubscribeCall { endpoint: self.endpoint.clone(), key: key.clone() });
            let delay = state.subscribe_delays.get_mut(&key).and_then(VecDeque::pop_front);
            (receiver, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn get_past_events(
        &self,
        descriptor: &SubscriptionDescriptor,
        from_block: u64,
        _to_block: BlockNumberOrTag,
    ) -> Result<Vec<Log>, ClientError> {
        let key = descriptor.key();
        let mut state = self.state.lock();
        state.fetch_calls.push(FetchCall {
            endpoint: self.endpoint.clone(),
            key: key.clone(),
            from_block,
        });
        state
            .past_events
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
