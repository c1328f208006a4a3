//! Follow one contract event across several endpoints.
//!
//! ```text
//! RUST_LOG=event_supervisor=debug,listen=info \
//!     cargo run --example listen -- counter.abi.json CountIncreased \
//!     0x5FbDB2315678afecb367f032d93F642f64180aa3 ws://127.0.0.1:8545 ws://127.0.0.1:8546
//! ```

use std::time::Duration;

use alloy::{json_abi::JsonAbi, primitives::Address};
use event_supervisor::{AlloyConnector, ListenRequest, Notification, SupervisorBuilder};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: listen <abi.json> <event> <contract address> <ws url>...";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let mut args = std::env::args().skip(1);
    let mut next_arg = || args.next().ok_or_else(|| anyhow::anyhow!(USAGE));
    let abi_path = next_arg()?;
    let event = next_arg()?;
    let address: Address = next_arg()?.parse()?;
    let endpoints: Vec<String> = args.collect();
    anyhow::ensure!(!endpoints.is_empty(), USAGE);

    let abi: JsonAbi = serde_json::from_str(&std::fs::read_to_string(&abi_path)?)?;

    let supervisor = SupervisorBuilder::new()
        .providers(endpoints)
        .call_timeout(Duration::from_secs(10))
        .history_interval(Duration::from_secs(60))
        .build(<AlloyConnector>::default())?;
    let mut notifications = supervisor.notifications();

    supervisor.init_connection().await?;

    let request = ListenRequest::new()
        .abi(abi)
        .address(address)
        .event(event)
        .keep_alive(Duration::from_secs(120))
        .on_data(|log| {
            info!(block = ?log.block_number, tx = ?log.transaction_hash, "Event received");
        })
        .on_changed(|log| {
            warn!(block = ?log.block_number, removed = log.removed, "Event changed");
        })
        .on_history(|logs| {
            info!(count = logs.len(), "Reconciled past events");
        });
    supervisor.listen(request).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notification = notifications.recv() => match notification {
                Ok(Notification::Disconnected) => {
                    error!("All providers failed, retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    if let Err(err) = supervisor.init_connection().await {
                        error!(error = %err, "Reconnect failed");
                    }
                }
                Ok(notification) => info!(?notification, "Supervisor notification"),
                Err(err) => warn!(error = %err, "Notification receiver lagged"),
            },
        }
    }

    supervisor.clear_connection().await;
    Ok(())
}
