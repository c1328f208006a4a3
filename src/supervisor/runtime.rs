use std::collections::HashMap;

use alloy::rpc::types::Log;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    SupervisorStatus,
    provider_pool::ProviderPool,
    registry::{SubscriptionKey, SubscriptionRegistry},
};

/// Live bookkeeping for one subscription. Dropped wholesale on reset.
#[derive(Debug)]
pub(crate) struct SubscriptionRuntime {
    pub generation: u64,
    pub last_checkpoint: u64,
    pub last_activity: Instant,
    /// Stops the listener, watchdog and reconciler of this subscription. Cancelling it drops
    /// the live stream.
    pub cancel: CancellationToken,
}

/// What a background task holds to prove it still owns its subscription's runtime.
///
/// A lease goes stale when the supervisor's generation moves past it or when its runtime is
/// replaced; both happen under the state lock, so a check under the same lock is exact.
#[derive(Debug, Clone)]
pub(crate) struct Lease {
    pub key: SubscriptionKey,
    pub generation: u64,
    pub cancel: CancellationToken,
}

/// Everything the supervisor mutates. Guarded by a single lock that is never held across an
/// `.await`.
#[derive(Debug)]
pub(crate) struct SharedState {
    pub providers: ProviderPool,
    pub registry: SubscriptionRegistry,
    pub runtimes: HashMap<SubscriptionKey, SubscriptionRuntime>,
    pub generation: u64,
    pub status: SupervisorStatus,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            providers: ProviderPool::new(),
            registry: SubscriptionRegistry::new(),
            runtimes: HashMap::new(),
            generation: 0,
            status: SupervisorStatus::Uninitialized,
        }
    }

    /// Start a new generation and cancel every live subscription. Returns the new generation.
    pub fn advance_generation(&mut self) -> u64 {
        self.generation += 1;
        for (_, runtime) in self.runtimes.drain() {
            runtime.cancel.cancel();
        }
        self.generation
    }

    /// Install a fresh runtime for `key`, cancelling the one it replaces.
    pub fn install(&mut self, key: SubscriptionKey, from_block: u64) -> Lease {
        let cancel = CancellationToken::new();
        let runtime = SubscriptionRuntime {
            generation: self.generation,
            last_checkpoint: from_block,
            last_activity: Instant::now(),
            cancel: cancel.clone(),
        };
        if let Some(previous) = self.runtimes.insert(key.clone(), runtime) {
            previous.cancel.cancel();
        }
        Lease { key, generation: self.generation, cancel }
    }

    pub fn remove_runtime(&mut self, key: &SubscriptionKey) -> bool {
        match self.runtimes.remove(key) {
            Some(runtime) => {
                runtime.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// The runtime `lease` refers to, if the lease is still current.
    pub fn runtime_mut(&mut self, lease: &Lease) -> Option<&mut SubscriptionRuntime> {
        if self.generation != lease.generation || lease.cancel.is_cancelled() {
            return None;
        }
        self.runtimes.get_mut(&lease.key).filter(|runtime| runtime.generation == lease.generation)
    }

    pub fn record_activity(&mut self, lease: &Lease) -> bool {
        match self.runtime_mut(lease) {
            Some(runtime) => {
                runtime.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn idle_time(&mut self, lease: &Lease) -> Option<Duration> {
        self.runtime_mut(lease).map(|runtime| runtime.last_activity.elapsed())
    }

    pub fn checkpoint(&mut self, lease: &Lease) -> Option<u64> {
        self.runtime_mut(lease).map(|runtime| runtime.last_checkpoint)
    }

    /// Advance the checkpoint to the highest block in `batch`. Never moves it backwards.
    pub fn commit_checkpoint(&mut self, lease: &Lease, batch: &[Log]) -> Option<u64> {
        let runtime = self.runtime_mut(lease)?;
        if let Some(highest) = batch.iter().filter_map(|log| log.block_number).max() {
            runtime.last_checkpoint = runtime.last_checkpoint.max(highest);
        }
        Some(runtime.last_checkpoint)
    }

    /// Recompute `Ready`/`Active` after the set of live subscriptions changed.
    pub fn settle_status(&mut self) {
        if self.status.is_connected() {
            self.status = if self.runtimes.is_empty() {
                SupervisorStatus::Ready
            } else {
                SupervisorStatus::Active
            };
        }
    }
}
