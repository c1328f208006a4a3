//! Helpers for testing code built on the supervisor. Enabled by the `test-utils` feature.

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, address},
    rpc::types::Log,
};

use crate::{client::Endpoint, registry::SubscriptionKey, supervisor::ListenRequest};

mod macros;
mod mock;

pub use mock::{FetchCall, MockConnection, MockConnector, SubscribeCall, transport_error};

/// Address the sample counter contract is registered under.
pub const COUNTER_ADDRESS: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

/// ABI of a counter contract with `CountIncreased` and `CountDecreased` events.
///
/// # Panics
///
/// Never in practice, the signatures are constant.
#[must_use]
pub fn counter_abi() -> JsonAbi {
    JsonAbi::parse([
        "event CountIncreased(uint256 newCount)",
        "event CountDecreased(uint256 newCount)",
    ])
    .expect("counter ABI signatures are valid")
}

/// A request for `CountIncreased` on [`COUNTER_ADDRESS`] with no callbacks.
#[must_use]
pub fn counter_request() -> ListenRequest {
    ListenRequest::new().abi(counter_abi()).address(COUNTER_ADDRESS).event("CountIncreased")
}

/// Key of [`counter_request`] with `event`.
#[must_use]
pub fn counter_key(event: &str) -> SubscriptionKey {
    SubscriptionKey::new(COUNTER_ADDRESS, event)
}

/// A mined log in `block`.
#[must_use]
pub fn log_at(block: u64) -> Log {
    Log { block_number: Some(block), ..Default::default() }
}

/// `urls` as endpoints, for comparing against recorded connection attempts.
#[must_use]
pub fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
    urls.iter().copied().map(Endpoint::from).collect()
}
