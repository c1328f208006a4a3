use std::{sync::Arc, time::Duration};

use alloy::eips::BlockNumberOrTag;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::{
    Notification,
    client::Connector,
    registry::{HistoryCallback, SubscriptionDescriptor},
    supervisor::{Inner, runtime::Lease},
};

/// Periodically fetch past events from the last checkpoint to `latest` and hand non-empty
/// batches to the history callback.
///
/// The state lock is only taken to read the checkpoint and to commit the new one; the fetch
/// runs unlocked. A batch fetched for a lease that went stale meanwhile is discarded.
/// Fetch failures are retried on the next tick. After `fetch_failure_threshold` consecutive
/// failures an error is logged and [`Notification::ReconcileStalled`] is sent, once per run
/// of failures.
pub(crate) async fn run<C: Connector>(
    inner: Arc<Inner<C>>,
    descriptor: SubscriptionDescriptor,
    on_history: HistoryCallback,
    lease: Lease,
    interval: Duration,
) {
    let threshold = inner.config.fetch_failure_threshold;
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0;

    loop {
        tokio::select! {
            biased;
            () = lease.cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Some(from_block) = inner.state.lock().checkpoint(&lease) else {
            return;
        };

        let fetched = tokio::select! {
            biased;
            () = lease.cancel.cancelled() => return,
            fetched = inner.connection.get_past_events(&descriptor, from_block, BlockNumberOrTag::Latest) => fetched,
        };

        let events = match fetched {
            Ok(events) => events,
            Err(err) => {
                consecutive_failures += 1;
                warn!(
                    key = %lease.key,
                    from_block,
                    consecutive_failures,
                    error = %err,
                    "Failed to fetch past events, retrying next tick"
                );
                if consecutive_failures == threshold {
                    error!(
                        key = %lease.key,
                        consecutive_failures,
                        "History reconciliation keeps failing"
                    );
                    inner.notify(Notification::ReconcileStalled {
                        key: lease.key.clone(),
                        consecutive_failures,
                    });
                }
                continue;
            }
        };

        if consecutive_failures > 0 {
            info!(key = %lease.key, consecutive_failures, "History reconciliation recovered");
            consecutive_failures = 0;
        }

        if events.is_empty() {
            trace!(key = %lease.key, from_block, "No past events");
            continue;
        }

        let Some(checkpoint) = inner.state.lock().commit_checkpoint(&lease, &events) else {
            debug!(key = %lease.key, "Discarding past events fetched before a reset");
            return;
        };

        debug!(
            key = %lease.key,
            from_block,
            checkpoint,
            count = events.len(),
            "Reconciled past events"
        );
        on_history(events);
    }
}
