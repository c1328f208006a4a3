use std::time::Duration;

use crate::{
    SupervisorError,
    client::{Connector, Endpoint},
    supervisor::Supervisor,
};

/// Default timeout applied to every connect, subscribe and fetch call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Default period between history reconciliations.
pub const DEFAULT_HISTORY_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default number of extra connection attempts during a reset.
pub const DEFAULT_MAX_RESET_RETRIES: usize = 3;
/// Default base delay of the reset backoff.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);
/// Default number of consecutive reconciliation failures before escalating.
pub const DEFAULT_FETCH_FAILURE_THRESHOLD: usize = 5;
/// Default capacity of the notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 128;

/// Settings shared by all supervisor tasks.
#[derive(Debug, Clone)]
pub(crate) struct SupervisorConfig {
    pub call_timeout: Duration,
    pub history_interval: Duration,
    pub max_reset_retries: usize,
    pub min_delay: Duration,
    pub fetch_failure_threshold: usize,
    pub notification_capacity: usize,
}

/// Builder for a [`Supervisor`].
///
/// # Example
///
/// ```no_run
/// # use event_supervisor::{AlloyConnector, SupervisorBuilder};
/// # use std::time::Duration;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let supervisor = SupervisorBuilder::new()
///     .providers(["wss://node-a.example", "wss://node-b.example"])
///     .call_timeout(Duration::from_secs(10))
///     .max_reset_retries(5)
///     .build(<AlloyConnector>::default())?;
///
/// supervisor.init_connection().await?;
/// # Ok(())
/// # }
/// ```
pub struct SupervisorBuilder {
    providers: Vec<Endpoint>,
    call_timeout: Duration,
    history_interval: Duration,
    max_reset_retries: usize,
    min_delay: Duration,
    fetch_failure_threshold: usize,
    notification_capacity: usize,
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            history_interval: DEFAULT_HISTORY_INTERVAL,
            max_reset_retries: DEFAULT_MAX_RESET_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
            fetch_failure_threshold: DEFAULT_FETCH_FAILURE_THRESHOLD,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }

    /// Initial provider pool. Can also be set later with
    /// [`Supervisor::set_providers`].
    #[must_use]
    pub fn providers<I, E>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Endpoint>,
    {
        self.providers = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Timeout for each connect, subscribe and past-events call.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Reconciliation period used by requests that enable history without setting their own.
    #[must_use]
    pub fn history_interval(mut self, interval: Duration) -> Self {
        self.history_interval = interval;
        self
    }

    /// Extra connection attempts (each against the next provider) before a reset gives up
    /// and the supervisor becomes disconnected. `0` means a single attempt.
    #[must_use]
    pub fn max_reset_retries(mut self, retries: usize) -> Self {
        self.max_reset_retries = retries;
        self
    }

    /// Base delay of the exponential backoff between reset attempts.
    #[must_use]
    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Consecutive reconciliation failures after which an escalated error is reported.
    #[must_use]
    pub fn fetch_failure_threshold(mut self, threshold: usize) -> Self {
        self.fetch_failure_threshold = threshold;
        self
    }

    /// Buffer size of the [`Notification`](crate::Notification) channel. Slow receivers
    /// skip notifications rather than blocking the supervisor.
    #[must_use]
    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Build the supervisor around `connector`. No connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidConfig`] for a zero call timeout, history interval,
    /// failure threshold or notification capacity.
    pub fn build<C: Connector>(self, connector: C) -> Result<Supervisor<C>, SupervisorError> {
        if self.call_timeout.is_zero() {
            return Err(SupervisorError::InvalidConfig("call timeout must be greater than 0"));
        }
        if self.history_interval.is_zero() {
            return Err(SupervisorError::InvalidConfig("history interval must be greater than 0"));
        }
        if self.fetch_failure_threshold == 0 {
            return Err(SupervisorError::InvalidConfig(
                "fetch failure threshold must be greater than 0",
            ));
        }
        if self.notification_capacity == 0 {
            return Err(SupervisorError::InvalidConfig(
                "notification capacity must be greater than 0",
            ));
        }

        debug!(
            call_timeout_ms = self.call_timeout.as_millis(),
            history_interval_ms = self.history_interval.as_millis(),
            max_reset_retries = self.max_reset_retries,
            provider_count = self.providers.len(),
            "Building Supervisor"
        );

        let config = SupervisorConfig {
            call_timeout: self.call_timeout,
            history_interval: self.history_interval,
            max_reset_retries: self.max_reset_retries,
            min_delay: self.min_delay,
            fetch_failure_threshold: self.fetch_failure_threshold,
            notification_capacity: self.notification_capacity,
        };

        let supervisor = Supervisor::new(connector, config);
        if !self.providers.is_empty() {
            supervisor.set_providers(self.providers)?;
        }
        Ok(supervisor)
    }
}
