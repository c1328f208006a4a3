use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::{
    ResetReason,
    client::Connector,
    supervisor::{Inner, runtime::Lease},
};

/// Lower bound on the check period for very short keep-alive timeouts.
const MIN_CHECK_PERIOD: Duration = Duration::from_millis(1);

/// Request a reset once the subscription has been silent for longer than `keep_alive`.
///
/// Checks twice per timeout, so silence is detected at most `1.5 * keep_alive` after the last
/// record. The watchdog exits after its first request: the reset either starts a new
/// watchdog or was superseded, so one silent stretch never yields a second request.
pub(crate) async fn run<C: Connector>(inner: Arc<Inner<C>>, lease: Lease, keep_alive: Duration) {
    let period = (keep_alive / 2).max(MIN_CHECK_PERIOD);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = lease.cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Some(idle) = inner.state.lock().idle_time(&lease) else {
            return;
        };

        if idle > keep_alive {
            warn!(
                key = %lease.key,
                idle_ms = idle.as_millis(),
                timeout_ms = keep_alive.as_millis(),
                "Keep-alive timed out, resetting connection and all subscriptions; consider a \
                 longer timeout if the subscription may still have been alive"
            );
            inner.request_reset_for(&lease, ResetReason::KeepAliveTimeout(lease.key.clone()));
            return;
        }

        trace!(key = %lease.key, idle_ms = idle.as_millis(), "Keep-alive check passed");
    }
}
