use std::time::Duration;

use event_supervisor::{
    Notification, StreamEvent, SupervisorError, SupervisorStatus, await_notification,
    test_utils::{COUNTER_ADDRESS, counter_key, counter_request, log_at},
};
use tokio::time::sleep;

use crate::common::{PROVIDER_A, collect_data, recv, setup_connected};

const SLOW_SUBSCRIBE: Duration = Duration::from_millis(100);

#[tokio::test]
async fn last_registration_wins() -> anyhow::Result<()> {
    let setup = setup_connected().await?;
    let key = counter_key("CountIncreased");

    let (first, mut first_data) = collect_data(counter_request());
    let (second, mut second_data) = collect_data(counter_request().from_block(500));
    setup.supervisor.listen(first).await?;
    setup.supervisor.listen(second).await?;

    assert_eq!(setup.supervisor.registered(), vec![key.clone()]);
    assert_eq!(setup.supervisor.live_subscriptions(), vec![key.clone()]);
    assert_eq!(setup.connector.subscribe_count(&key), 2);
    assert_eq!(setup.supervisor.checkpoint(&key), Some(500));

    setup.connector.emit(&key, StreamEvent::Data(log_at(7)));
    assert_eq!(recv(&mut second_data).await.block_number, Some(7));
    assert!(first_data.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn unsubscribe_stops_and_forgets() -> anyhow::Result<()> {
    let setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    setup.supervisor.listen(counter_request()).await?;
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Active);

    assert!(setup.supervisor.unsubscribe(COUNTER_ADDRESS, "CountIncreased"));
    assert!(!setup.supervisor.unsubscribe(COUNTER_ADDRESS, "CountIncreased"));

    assert!(setup.supervisor.registered().is_empty());
    assert!(setup.supervisor.live_subscriptions().is_empty());
    assert_eq!(setup.supervisor.checkpoint(&key), None);
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Ready);

    // an unregistered key is not replayed
    setup.supervisor.reset_connection().await?;
    assert_eq!(setup.connector.subscribe_count(&key), 1);
    Ok(())
}

#[tokio::test]
async fn clear_keeps_registrations_for_next_init() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    let (request, mut data) = collect_data(counter_request());
    setup.supervisor.listen(request).await?;

    setup.supervisor.clear_connection().await;

    assert_eq!(setup.supervisor.status(), SupervisorStatus::Uninitialized);
    assert!(setup.supervisor.live_subscriptions().is_empty());
    assert_eq!(setup.supervisor.registered(), vec![key.clone()]);
    let err = setup.supervisor.listen(counter_request()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotReady));

    setup.supervisor.init_connection().await?;

    let generation = setup.supervisor.generation();
    let subscribed = await_notification!(setup.notifications, Notification::Subscribed { .. });
    assert_eq!(subscribed, Notification::Subscribed { key: key.clone(), generation: 1 });
    let subscribed = await_notification!(setup.notifications, Notification::Subscribed { .. });
    assert_eq!(subscribed, Notification::Subscribed { key: key.clone(), generation });

    assert_eq!(setup.supervisor.current_provider(), Some(PROVIDER_A.into()));
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Active);
    assert_eq!(setup.connector.subscribe_count(&key), 2);

    setup.connector.emit(&key, StreamEvent::Data(log_at(1)));
    assert_eq!(recv(&mut data).await.block_number, Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_earlier_listen_does_not_override_later_one() -> anyhow::Result<()> {
    let setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    setup.connector.delay_subscribe(&key, SLOW_SUBSCRIBE);

    let (first, mut first_data) = collect_data(counter_request().from_block(1));
    let (second, mut second_data) = collect_data(counter_request().from_block(2));
    let supervisor = setup.supervisor.clone();
    let slow = tokio::spawn(async move { supervisor.listen(first).await });

    sleep(Duration::from_millis(10)).await;
    setup.supervisor.listen(second).await?;
    slow.await??;

    assert_eq!(setup.supervisor.registered(), vec![key.clone()]);
    assert_eq!(setup.supervisor.live_subscriptions(), vec![key.clone()]);
    assert_eq!(setup.supervisor.checkpoint(&key), Some(2));

    assert!(setup.connector.emit(&key, StreamEvent::Data(log_at(7))));
    assert_eq!(recv(&mut second_data).await.block_number, Some(7));
    assert!(first_data.try_recv().is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn listen_during_init_replay_wins() -> anyhow::Result<()> {
    let setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    let (first, mut first_data) = collect_data(counter_request().from_block(1));
    setup.supervisor.listen(first).await?;

    // the replay of the first registration is slow to open
    setup.connector.delay_subscribe(&key, SLOW_SUBSCRIBE);
    let supervisor = setup.supervisor.clone();
    let init = tokio::spawn(async move { supervisor.init_connection().await });

    sleep(Duration::from_millis(10)).await;
    let (second, mut second_data) = collect_data(counter_request().from_block(2));
    setup.supervisor.listen(second).await?;
    init.await??;

    assert_eq!(setup.supervisor.live_subscriptions(), vec![key.clone()]);
    assert_eq!(setup.supervisor.checkpoint(&key), Some(2));
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Active);

    assert!(setup.connector.emit(&key, StreamEvent::Data(log_at(8))));
    assert_eq!(recv(&mut second_data).await.block_number, Some(8));
    assert!(first_data.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn event_missing_from_abi_is_rejected() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    setup.supervisor.listen(counter_request()).await?;
    await_notification!(setup.notifications, Notification::Subscribed { .. });

    let err = setup.supervisor.listen(counter_request().event("Transfer")).await.unwrap_err();

    assert!(matches!(err, SupervisorError::InvalidRequest("event defined in the ABI")));
    assert_eq!(setup.supervisor.registered(), vec![counter_key("CountIncreased")]);
    assert_eq!(setup.connector.subscribe_count(&counter_key("Transfer")), 0);
    // healthy subscriptions are left alone
    sleep(Duration::from_millis(20)).await;
    assert_eq!(setup.supervisor.generation(), 1);
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Active);
    Ok(())
}
