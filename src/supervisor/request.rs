use std::{sync::Arc, time::Duration};

use alloy::{
    json_abi::JsonAbi,
    primitives::Address,
    rpc::types::{Filter, Log},
};

use crate::{
    SupervisorError,
    registry::{HistoryCallback, LogCallback, SubscriptionDescriptor},
};

/// A request to keep one event subscription alive.
///
/// `abi`, `address` and `event` are required; everything else is optional.
///
/// # Example
///
/// ```no_run
/// # use alloy::{json_abi::JsonAbi, primitives::address};
/// # use event_supervisor::ListenRequest;
/// # use std::time::Duration;
/// # fn example(abi: JsonAbi) {
/// let request = ListenRequest::new()
///     .abi(abi)
///     .address(address!("0xd8dA6BF26964af9d7eed9e03e53415d37aa96045"))
///     .event("Transfer")
///     .on_data(|log| println!("live: {:?}", log.transaction_hash))
///     .on_history(|logs| println!("reconciled {} logs", logs.len()))
///     .history_interval(Duration::from_secs(60))
///     .from_block(19_000_000)
///     .keep_alive(Duration::from_secs(120));
/// # }
/// ```
#[derive(Default)]
pub struct ListenRequest {
    abi: Option<Arc<JsonAbi>>,
    address: Option<Address>,
    event: Option<String>,
    on_data: Option<LogCallback>,
    on_changed: Option<LogCallback>,
    on_history: Option<HistoryCallback>,
    history_interval: Option<Duration>,
    from_block: u64,
    keep_alive: Option<Duration>,
    filter: Option<Filter>,
}

impl ListenRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ABI containing the event definition.
    #[must_use]
    pub fn abi(mut self, abi: impl Into<Arc<JsonAbi>>) -> Self {
        self.abi = Some(abi.into());
        self
    }

    /// Contract address emitting the event.
    #[must_use]
    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Event name as it appears in the ABI.
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Called for every live record.
    #[must_use]
    pub fn on_data(mut self, callback: impl Fn(Log) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(callback));
        self
    }

    /// Called for every live record the node reports as changed (removed by a reorg).
    #[must_use]
    pub fn on_changed(mut self, callback: impl Fn(Log) + Send + Sync + 'static) -> Self {
        self.on_changed = Some(Arc::new(callback));
        self
    }

    /// Enables history reconciliation; called with each non-empty batch of past records.
    ///
    /// Records at the last reconciled block may be delivered again, so the callback should be
    /// idempotent per record (e.g. keyed by transaction hash and log index).
    #[must_use]
    pub fn on_history(mut self, callback: impl Fn(Vec<Log>) + Send + Sync + 'static) -> Self {
        self.on_history = Some(Arc::new(callback));
        self
    }

    /// Period between history reconciliations. Defaults to the supervisor's
    /// [`history_interval`](crate::SupervisorBuilder::history_interval).
    #[must_use]
    pub fn history_interval(mut self, interval: Duration) -> Self {
        self.history_interval = Some(interval);
        self
    }

    /// Block the first reconciliation starts from. Defaults to `0`.
    #[must_use]
    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = block;
        self
    }

    /// Reset the connection if no record arrives for this long.
    #[must_use]
    pub fn keep_alive(mut self, timeout: Duration) -> Self {
        self.keep_alive = Some(timeout);
        self
    }

    /// Base filter, typically used to match indexed event arguments via its topics.
    ///
    /// Address, event signature and block range are set by the supervisor.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Validate the request and freeze it into a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidRequest`] if `abi`, `address` or `event` is missing,
    /// if the ABI has no event by that name, or if a configured interval is zero.
    pub fn into_descriptor(
        self,
        default_history_interval: Duration,
    ) -> Result<SubscriptionDescriptor, SupervisorError> {
        let abi = self.abi.ok_or(SupervisorError::InvalidRequest("abi"))?;
        let address = self.address.ok_or(SupervisorError::InvalidRequest("address"))?;
        let event = self.event.ok_or(SupervisorError::InvalidRequest("event"))?;
        if !abi.event(&event).is_some_and(|overloads| !overloads.is_empty()) {
            return Err(SupervisorError::InvalidRequest("event defined in the ABI"));
        }

        let history_interval = self.history_interval.unwrap_or(default_history_interval);
        if history_interval.is_zero() {
            return Err(SupervisorError::InvalidRequest("non-zero history interval"));
        }
        if self.keep_alive.is_some_and(|timeout| timeout.is_zero()) {
            return Err(SupervisorError::InvalidRequest("non-zero keep-alive timeout"));
        }

        Ok(SubscriptionDescriptor {
            abi,
            address,
            event,
            on_data: self.on_data.unwrap_or_else(|| Arc::new(|_| {})),
            on_changed: self.on_changed.unwrap_or_else(|| Arc::new(|_| {})),
            on_history: self.on_history,
            history_interval,
            from_block: self.from_block,
            keep_alive: self.keep_alive,
            filter: self.filter.unwrap_or_default(),
            registration: 0,
        })
    }
}
