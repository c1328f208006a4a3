//! The subscription supervisor.
//!
//! [`Supervisor`] keeps every registered subscription alive across connection failures:
//!
//! * [`listen`](Supervisor::listen) registers a [`ListenRequest`] and opens its live stream,
//!   plus an optional keep-alive watchdog and history reconciler.
//! * A watchdog timeout or a stream error resets the connection: every live stream and timer
//!   is torn down, the provider is rotated, a new connection is opened and every registration
//!   is replayed.
//!
//! # Generations
//!
//! Each reset starts a new generation. Background tasks remember the generation they were
//! started in and become no-ops once it is no longer current, so a tick that was in flight
//! while a reset happened can never write into the rebuilt state.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use alloy::primitives::Address;
use backon::{ExponentialBuilder, Retryable};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    Notification, ResetReason, SupervisorError, SupervisorStatus,
    client::{Connector, Endpoint},
    connection::ConnectionManager,
    registry::{SubscriptionDescriptor, SubscriptionKey},
};

mod builder;
mod listener;
mod reconciler;
mod request;
mod runtime;
mod watchdog;

pub use builder::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_FETCH_FAILURE_THRESHOLD, DEFAULT_HISTORY_INTERVAL,
    DEFAULT_MAX_RESET_RETRIES, DEFAULT_MIN_DELAY, DEFAULT_NOTIFICATION_CAPACITY,
    SupervisorBuilder,
};
pub use request::ListenRequest;

use builder::SupervisorConfig;
use runtime::{Lease, SharedState};

/// Keeps event subscriptions alive across a pool of equivalent providers.
///
/// Cloning is cheap; clones share the same state.
pub struct Supervisor<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

pub(crate) struct Inner<C: Connector> {
    config: SupervisorConfig,
    connection: ConnectionManager<C>,
    state: Mutex<SharedState>,
    /// Serializes whole connection transitions (init, reset, clear).
    transition: tokio::sync::Mutex<()>,
    notifications: broadcast::Sender<Notification>,
}

impl<C: Connector> Supervisor<C> {
    pub(crate) fn new(connector: C, config: SupervisorConfig) -> Self {
        let (notifications, _) = broadcast::channel(config.notification_capacity);
        let connection = ConnectionManager::new(connector, config.call_timeout);
        Self {
            inner: Arc::new(Inner {
                config,
                connection,
                state: Mutex::new(SharedState::new()),
                transition: tokio::sync::Mutex::new(()),
                notifications,
            }),
        }
    }

    /// Shorthand for [`SupervisorBuilder::new`].
    #[must_use]
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Replace the provider pool. The cursor returns to the first endpoint; the active
    /// connection, if any, is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidConfig`] if `endpoints` is empty, leaving the previous
    /// pool in place.
    pub fn set_providers<I, E>(&self, endpoints: I) -> Result<(), SupervisorError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Endpoint>,
    {
        let mut state = self.inner.state.lock();
        state.providers.set_providers(endpoints).inspect_err(|err| {
            error!(error = %err, "Rejected provider list");
        })?;
        info!(provider_count = state.providers.len(), "Providers set");
        Ok(())
    }

    /// Connect to the current provider.
    ///
    /// Any live subscriptions from an earlier connection are torn down and every registered
    /// subscription is replayed on the new one, which makes this the way out of
    /// [`SupervisorStatus::Disconnected`].
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::NotConfigured`] if no providers are set.
    /// * [`SupervisorError::Connection`] if the provider cannot be reached. The previous
    ///   connection, if any, stays in place.
    pub async fn init_connection(&self) -> Result<(), SupervisorError> {
        let _transition = self.inner.transition.lock().await;

        let endpoint = {
            let state = self.inner.state.lock();
            state.providers.current().inspect_err(|_| warn!("Set providers first"))?.clone()
        };

        self.inner.connection.open(&endpoint).await.inspect_err(|err| {
            error!(endpoint = %endpoint, error = %err, "Failed to initialize connection");
        })?;
        self.inner.notify(Notification::Connected { endpoint });

        let generation = {
            let mut state = self.inner.state.lock();
            let generation = state.advance_generation();
            state.status = SupervisorStatus::Ready;
            generation
        };

        let (replayed, registered) = self.inner.replay(generation).await;
        if registered > 0 {
            info!(replayed, registered, "Replayed registered subscriptions");
        }
        Ok(())
    }

    /// Tear down every live subscription and release the connection.
    ///
    /// Registrations are kept and replayed by the next
    /// [`init_connection`](Self::init_connection). Calling this without a connection is a
    /// no-op.
    pub async fn clear_connection(&self) {
        let _transition = self.inner.transition.lock().await;
        {
            let mut state = self.inner.state.lock();
            state.advance_generation();
            state.status = SupervisorStatus::Uninitialized;
        }
        if self.inner.connection.close() {
            info!("Connection cleared");
        }
    }

    /// Register `request` and open its live stream.
    ///
    /// A registration for the same address and event replaces the previous one. If
    /// `on_history` is set a reconciler starts; if `keep_alive` is set a watchdog starts.
    ///
    /// A failure to open the live stream does not fail this call: the registration is kept,
    /// the failure is logged and the connection is reset, which replays the registration.
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::InvalidRequest`] if `abi`, `address` or `event` is missing, or
    ///   the ABI does not define `event`.
    /// * [`SupervisorError::NotReady`] if there is no open connection.
    pub async fn listen(&self, request: ListenRequest) -> Result<(), SupervisorError> {
        let descriptor = request.into_descriptor(self.inner.config.history_interval)?;
        let key = descriptor.key();

        let (descriptor, generation) = {
            let mut state = self.inner.state.lock();
            if !state.status.is_connected() {
                warn!(key = %key, status = ?state.status, "Initialize the connection first");
                return Err(SupervisorError::NotReady);
            }
            if state.registry.get(&key).is_some() {
                debug!(key = %key, "Replacing existing registration");
            }
            let descriptor = state.registry.put(key.clone(), descriptor).clone();
            (descriptor, state.generation)
        };

        if let Err(err) = self.inner.activate(descriptor, generation).await {
            error!(key = %key, error = %err, "Failed to open live stream, resetting connection");
            self.inner.request_reset(generation, ResetReason::SubscribeFailed(key));
        }
        Ok(())
    }

    /// Remove the registration for `event` on `address` and stop its live stream and timers.
    ///
    /// Returns `false` if nothing was registered under that key.
    pub fn unsubscribe(&self, address: Address, event: &str) -> bool {
        let key = SubscriptionKey::new(address, event);
        let mut state = self.inner.state.lock();
        let removed = state.registry.remove(&key).is_some();
        state.remove_runtime(&key);
        state.settle_status();
        if removed {
            info!(key = %key, "Unsubscribed");
        }
        removed
    }

    /// Tear everything down, move to the next provider, reconnect and replay every
    /// registration.
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::NotConfigured`] if no providers are set.
    /// * [`SupervisorError::NotReady`] if the connection was never initialized.
    /// * [`SupervisorError::Disconnected`] if no provider could be reached within the retry
    ///   budget.
    pub async fn reset_connection(&self) -> Result<(), SupervisorError> {
        let _transition = self.inner.transition.lock().await;
        {
            let state = self.inner.state.lock();
            if state.providers.is_empty() {
                return Err(SupervisorError::NotConfigured);
            }
            if state.status == SupervisorStatus::Uninitialized {
                warn!("No existing connection to reset");
                return Err(SupervisorError::NotReady);
            }
        }
        self.inner.reset(ResetReason::Manual).await
    }

    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        self.inner.state.lock().status
    }

    /// Current generation; increases on every reset, init and clear.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Number of connections opened so far.
    #[must_use]
    pub fn connection_epoch(&self) -> u64 {
        self.inner.connection.epoch()
    }

    #[must_use]
    pub fn current_provider(&self) -> Option<Endpoint> {
        self.inner.state.lock().providers.current().ok().cloned()
    }

    /// Keys of every registration, in registration order.
    #[must_use]
    pub fn registered(&self) -> Vec<SubscriptionKey> {
        self.inner.state.lock().registry.keys().cloned().collect()
    }

    /// Keys with a live stream in the current generation.
    #[must_use]
    pub fn live_subscriptions(&self) -> Vec<SubscriptionKey> {
        let state = self.inner.state.lock();
        state.registry.keys().filter(|key| state.runtimes.contains_key(key)).cloned().collect()
    }

    /// Block the next history reconciliation of `key` starts from.
    #[must_use]
    pub fn checkpoint(&self, key: &SubscriptionKey) -> Option<u64> {
        self.inner.state.lock().runtimes.get(key).map(|runtime| runtime.last_checkpoint)
    }

    /// Receive every [`Notification`] emitted from now on.
    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }
}

impl<C: Connector> Inner<C> {
    fn notify(&self, notification: Notification) {
        // no receivers is fine
        let _ = self.notifications.send(notification);
    }

    fn is_live(&self, lease: &Lease) -> bool {
        self.state.lock().runtime_mut(lease).is_some()
    }

    /// Open the live stream for `descriptor` and start its tasks, unless `generation` went
    /// stale or `descriptor` stopped being the current registration while subscribing.
    async fn activate(
        self: &Arc<Self>,
        descriptor: SubscriptionDescriptor,
        generation: u64,
    ) -> Result<(), SupervisorError> {
        let key = descriptor.key();
        let stream = self.connection.subscribe(&descriptor).await?;

        let lease = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(key = %key, generation, "Generation changed while subscribing, dropping stream");
                return Ok(());
            }
            if !state.registry.is_current(&descriptor) {
                debug!(
                    key = %key,
                    "Registration replaced or removed while subscribing, dropping stream"
                );
                return Ok(());
            }
            let lease = state.install(key.clone(), descriptor.from_block);
            state.settle_status();
            lease
        };

        tokio::spawn(listener::run(Arc::clone(self), descriptor.clone(), lease.clone(), stream));
        if let Some(keep_alive) = descriptor.keep_alive {
            tokio::spawn(watchdog::run(Arc::clone(self), lease.clone(), keep_alive));
        }
        if let Some(on_history) = descriptor.on_history.clone() {
            let interval = descriptor.history_interval;
            tokio::spawn(reconciler::run(
                Arc::clone(self),
                descriptor,
                on_history,
                lease,
                interval,
            ));
        }

        info!(key = %key, generation, "Subscribed");
        self.notify(Notification::Subscribed { key, generation });
        Ok(())
    }

    /// Ask for a reset on behalf of a task started in `generation`.
    ///
    /// The reset runs on its own task so the caller is never torn down mid-call. Requests
    /// from a stale generation are ignored, and so are duplicates: the first reset advances
    /// the generation and every queued request for the old one becomes stale.
    fn request_reset(self: &Arc<Self>, generation: u64, reason: ResetReason) {
        let current = self.state.lock().generation;
        if current != generation {
            debug!(requested = generation, current, reason = %reason, "Ignoring stale reset request");
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _transition = inner.transition.lock().await;
            let current = inner.state.lock().generation;
            if current != generation {
                debug!(requested = generation, current, "Reset already handled");
                return;
            }
            if let Err(err) = inner.reset(reason).await {
                error!(error = %err, "Automatic reset failed");
            }
        });
    }

    fn request_reset_for(self: &Arc<Self>, lease: &Lease, reason: ResetReason) {
        if self.is_live(lease) {
            self.request_reset(lease.generation, reason);
        } else {
            debug!(key = %lease.key, "Ignoring reset request from replaced subscription");
        }
    }

    /// Must be called with `transition` held.
    async fn reset(self: &Arc<Self>, reason: ResetReason) -> Result<(), SupervisorError> {
        let (generation, torn_down) = {
            let mut state = self.state.lock();
            let torn_down = state.runtimes.len();
            let generation = state.advance_generation();
            state.status = SupervisorStatus::Resetting;
            (generation, torn_down)
        };
        warn!(
            generation,
            reason = %reason,
            subscriptions = torn_down,
            "Resetting connection, interrupting all live subscriptions"
        );
        self.notify(Notification::ResetStarted { generation, reason });
        self.connection.close();

        let endpoint = match self.reconnect().await {
            Ok(endpoint) => endpoint,
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    if state.generation == generation {
                        state.status = SupervisorStatus::Disconnected;
                    }
                }
                error!(error = %err, "All providers failed, supervisor disconnected");
                self.notify(Notification::Disconnected);
                return Err(match err {
                    SupervisorError::Connection(source) => SupervisorError::Disconnected(source),
                    other => other,
                });
            }
        };
        self.notify(Notification::Connected { endpoint });

        let (replayed, registered) = self.replay(generation).await;
        info!(generation, replayed, registered, "Reset complete");
        self.notify(Notification::ResetCompleted { generation, replayed, registered });
        Ok(())
    }

    /// Rotate and connect, retrying with exponential backoff. Every attempt moves to the next
    /// provider.
    async fn reconnect(&self) -> Result<Endpoint, SupervisorError> {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.config.max_reset_retries)
            .with_min_delay(self.config.min_delay);

        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;

        (|| async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let endpoint = self.rotate_provider()?;
            info!(endpoint = %endpoint, attempt, "Connecting to next provider");
            self.connection.open(&endpoint).await?;
            Ok::<_, SupervisorError>(endpoint)
        })
        .retry(retry_strategy)
        .when(|err: &SupervisorError| matches!(err, SupervisorError::Connection(_)))
        .notify(|err: &SupervisorError, delay| {
            warn!(error = %err, delay_ms = delay.as_millis(), "Reconnect failed, retrying");
        })
        .sleep(tokio::time::sleep)
        .await
    }

    fn rotate_provider(&self) -> Result<Endpoint, SupervisorError> {
        let endpoint = {
            let mut state = self.state.lock();
            state.providers.rotate().cloned().ok_or(SupervisorError::NotConfigured)?
        };
        info!(endpoint = %endpoint, "Rotated provider");
        self.notify(Notification::ProviderRotated { endpoint: endpoint.clone() });
        Ok(endpoint)
    }

    /// Re-open every registration in `generation`, best effort. Returns
    /// `(replayed, registered)`.
    async fn replay(self: &Arc<Self>, generation: u64) -> (usize, usize) {
        let descriptors: Vec<SubscriptionDescriptor> =
            self.state.lock().registry.all().map(|(_, descriptor)| descriptor.clone()).collect();
        let registered = descriptors.len();

        let mut replayed = 0;
        for descriptor in descriptors {
            let key = descriptor.key();
            match self.activate(descriptor, generation).await {
                Ok(()) => replayed += 1,
                Err(err) => warn!(key = %key, error = %err, "Failed to replay subscription"),
            }
        }

        let mut state = self.state.lock();
        if state.generation == generation {
            if state.status == SupervisorStatus::Resetting {
                state.status = SupervisorStatus::Ready;
            }
            state.settle_status();
        }
        (replayed, registered)
    }
}
