use std::time::Duration;

use alloy::rpc::types::Log;
use event_supervisor::{
    ListenRequest, Notification, Supervisor, SupervisorBuilder, test_utils::MockConnector,
};
use tokio::sync::{broadcast, mpsc};

pub const PROVIDER_A: &str = "ws://node-a";
pub const PROVIDER_B: &str = "ws://node-b";
pub const PROVIDER_C: &str = "ws://node-c";

pub struct SupervisorSetup {
    pub connector: MockConnector,
    pub supervisor: Supervisor<MockConnector>,
    pub notifications: broadcast::Receiver<Notification>,
}

/// Builder preset with a short backoff so paused-time tests stay small.
pub fn test_builder() -> SupervisorBuilder {
    SupervisorBuilder::new().min_delay(Duration::from_millis(100))
}

/// A supervisor over A, B and C, connected to A.
pub async fn setup_connected() -> anyhow::Result<SupervisorSetup> {
    setup_with(test_builder()).await
}

pub async fn setup_with(builder: SupervisorBuilder) -> anyhow::Result<SupervisorSetup> {
    let connector = MockConnector::new();
    let supervisor =
        builder.providers([PROVIDER_A, PROVIDER_B, PROVIDER_C]).build(connector.clone())?;
    let notifications = supervisor.notifications();
    supervisor.init_connection().await?;
    Ok(SupervisorSetup { connector, supervisor, notifications })
}

/// Route `on_data` of `request` into a channel.
pub fn collect_data(request: ListenRequest) -> (ListenRequest, mpsc::UnboundedReceiver<Log>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let request = request.on_data(move |log| {
        let _ = tx.send(log);
    });
    (request, rx)
}

/// Route `on_history` of `request` into a channel.
pub fn collect_history(
    request: ListenRequest,
) -> (ListenRequest, mpsc::UnboundedReceiver<Vec<Log>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let request = request.on_history(move |batch| {
        let _ = tx.send(batch);
    });
    (request, rx)
}

/// Next item of `rx`, failing the test after five seconds.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}
