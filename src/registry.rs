//! Durable record of every logical subscription.
//!
//! The registry is the source of truth for rebuilding subscriptions after a reset: runtime
//! state is thrown away, descriptors are not.

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    sync::Arc,
    time::Duration,
};

use alloy::{
    json_abi::JsonAbi,
    primitives::Address,
    rpc::types::{Filter, Log},
};

/// Callback receiving one live record.
pub type LogCallback = Arc<dyn Fn(Log) + Send + Sync>;

/// Callback receiving a batch of reconciled records, oldest first.
pub type HistoryCallback = Arc<dyn Fn(Vec<Log>) + Send + Sync>;

/// Identifies one logical subscription: an event on a contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    address: Address,
    event: String,
}

impl SubscriptionKey {
    #[must_use]
    pub fn new(address: Address, event: impl Into<String>) -> Self {
        Self { address, event: event.into() }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.event, self.address)
    }
}

/// Registration record for one subscription. Immutable once created.
///
/// Built from a [`ListenRequest`](crate::ListenRequest) by
/// [`Supervisor::listen`](crate::Supervisor::listen).
#[derive(Clone)]
pub struct SubscriptionDescriptor {
    pub(crate) abi: Arc<JsonAbi>,
    pub(crate) address: Address,
    pub(crate) event: String,
    pub(crate) on_data: LogCallback,
    pub(crate) on_changed: LogCallback,
    pub(crate) on_history: Option<HistoryCallback>,
    pub(crate) history_interval: Duration,
    pub(crate) from_block: u64,
    pub(crate) keep_alive: Option<Duration>,
    pub(crate) filter: Filter,
    /// Stamped by [`SubscriptionRegistry::put`]; `0` until registered.
    pub(crate) registration: u64,
}

impl SubscriptionDescriptor {
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.address, self.event.clone())
    }

    #[must_use]
    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Base log filter (indexed-argument topics) merged into every query.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// First block the history reconciler queries from.
    #[must_use]
    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    #[must_use]
    pub fn keep_alive(&self) -> Option<Duration> {
        self.keep_alive
    }

    /// Reconciliation period, `None` when no history callback is registered.
    #[must_use]
    pub fn history_interval(&self) -> Option<Duration> {
        self.on_history.as_ref().map(|_| self.history_interval)
    }
}

impl fmt::Debug for SubscriptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionDescriptor")
            .field("address", &self.address)
            .field("event", &self.event)
            .field("from_block", &self.from_block)
            .field("keep_alive", &self.keep_alive)
            .field("history_interval", &self.history_interval())
            .finish_non_exhaustive()
    }
}

/// Descriptors keyed by [`SubscriptionKey`], iterated in first-insertion order.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<SubscriptionKey, SubscriptionDescriptor>,
    order: Vec<SubscriptionKey>,
    last_registration: u64,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the descriptor for `key` and return the stored copy.
    ///
    /// Every call stamps a fresh registration number, so a copy taken before a later `put`
    /// for the same key is no longer [`current`](Self::is_current). A replaced key keeps its
    /// original position in iteration order.
    pub fn put(
        &mut self,
        key: SubscriptionKey,
        mut descriptor: SubscriptionDescriptor,
    ) -> &SubscriptionDescriptor {
        self.last_registration += 1;
        descriptor.registration = self.last_registration;
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(descriptor);
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(descriptor)
            }
        }
    }

    /// Whether `descriptor` is still the registration stored under its key.
    #[must_use]
    pub fn is_current(&self, descriptor: &SubscriptionDescriptor) -> bool {
        self.entries
            .get(&descriptor.key())
            .is_some_and(|stored| stored.registration == descriptor.registration)
    }

    #[must_use]
    pub fn get(&self, key: &SubscriptionKey) -> Option<&SubscriptionDescriptor> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &SubscriptionKey) -> Option<SubscriptionDescriptor> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    /// Iterate over every registration. Each call starts a fresh pass.
    pub fn all(&self) -> impl Iterator<Item = (&SubscriptionKey, &SubscriptionDescriptor)> + '_ {
        self.order.iter().filter_map(|key| self.entries.get_key_value(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &SubscriptionKey> + '_ {
        self.order.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
