use std::sync::Arc;

use tokio_stream::StreamExt;

use crate::{
    ResetReason, SupervisorError,
    client::{ClientError, Connector, EventStream, StreamEvent},
    registry::SubscriptionDescriptor,
    supervisor::{Inner, runtime::Lease},
};

/// Drive one live stream: forward records to the caller's callbacks and feed the watchdog.
///
/// Exits when the lease is cancelled (dropping the stream) or when the stream fails, in which
/// case a reset is requested.
pub(crate) async fn run<C: Connector>(
    inner: Arc<Inner<C>>,
    descriptor: SubscriptionDescriptor,
    lease: Lease,
    mut stream: EventStream,
) {
    loop {
        let item = tokio::select! {
            biased;
            () = lease.cancel.cancelled() => {
                debug!(key = %lease.key, generation = lease.generation, "Listener stopped");
                return;
            }
            item = stream.next() => item,
        };

        let error = match item {
            Some(StreamEvent::Connected) => {
                info!(key = %lease.key, "Subscription connected");
                continue;
            }
            Some(StreamEvent::Data(log)) => {
                if !inner.state.lock().record_activity(&lease) {
                    return;
                }
                (descriptor.on_data)(log);
                continue;
            }
            Some(StreamEvent::Changed(log)) => {
                if !inner.state.lock().record_activity(&lease) {
                    return;
                }
                (descriptor.on_changed)(log);
                continue;
            }
            Some(StreamEvent::Error(err)) => err,
            None => ClientError::SubscriptionClosed,
        };

        let error = SupervisorError::Stream(error);
        error!(key = %lease.key, error = %error, "Subscription stream failed");
        inner.request_reset_for(&lease, ResetReason::StreamError(lease.key.clone()));
        return;
    }
}
