use std::time::Duration;

use event_supervisor::{
    Notification, ResetReason, StreamEvent, SupervisorStatus, assert_next_notification,
    assert_no_notification, await_notification,
    test_utils::{COUNTER_ADDRESS, counter_key, counter_request, endpoints, log_at},
};
use tokio::time::{Instant, sleep};

use crate::common::{PROVIDER_A, PROVIDER_B, collect_data, recv, setup_connected};

const KEEP_ALIVE: Duration = Duration::from_millis(1000);

#[tokio::test(start_paused = true)]
async fn silence_triggers_exactly_one_reset() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    let started = Instant::now();
    let (request, mut data) = collect_data(counter_request().keep_alive(KEEP_ALIVE));
    setup.supervisor.listen(request).await?;
    await_notification!(setup.notifications, Notification::Subscribed { .. });

    assert_next_notification!(
        setup.notifications,
        Notification::ResetStarted {
            generation: 2,
            reason: ResetReason::KeepAliveTimeout(key.clone())
        }
    );
    // detected on the third check, after 1.5 timeouts of silence
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1500) && elapsed < Duration::from_millis(2000));

    let completed = await_notification!(setup.notifications, Notification::ResetCompleted { .. });
    assert_eq!(
        completed,
        Notification::ResetCompleted { generation: 2, replayed: 1, registered: 1 }
    );
    assert_eq!(setup.supervisor.current_provider(), Some(PROVIDER_B.into()));
    assert_eq!(setup.supervisor.live_subscriptions(), vec![key.clone()]);
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Active);

    // the replayed subscription on B starts a fresh silence window
    sleep(Duration::from_millis(1400)).await;
    assert_no_notification!(setup.notifications);
    assert_eq!(setup.connector.connect_attempts(), endpoints(&[PROVIDER_A, PROVIDER_B]));

    setup.connector.emit(&key, StreamEvent::Data(log_at(1)));
    assert_eq!(recv(&mut data).await.block_number, Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn steady_data_keeps_connection() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    let (request, mut data) = collect_data(counter_request().keep_alive(KEEP_ALIVE));
    setup.supervisor.listen(request).await?;
    await_notification!(setup.notifications, Notification::Subscribed { .. });

    for block in 0..10 {
        sleep(Duration::from_millis(600)).await;
        setup.connector.emit(&key, StreamEvent::Data(log_at(block)));
        assert_eq!(recv(&mut data).await.block_number, Some(block));
    }

    assert_no_notification!(setup.notifications);
    assert_eq!(setup.supervisor.generation(), 1);
    assert_eq!(setup.connector.connect_attempts(), endpoints(&[PROVIDER_A]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn simultaneous_timeouts_share_one_reset() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    setup.supervisor.listen(counter_request().keep_alive(KEEP_ALIVE)).await?;
    setup
        .supervisor
        .listen(counter_request().event("CountDecreased").keep_alive(KEEP_ALIVE))
        .await?;

    let completed = await_notification!(setup.notifications, Notification::ResetCompleted { .. });
    assert_eq!(
        completed,
        Notification::ResetCompleted { generation: 2, replayed: 2, registered: 2 }
    );

    sleep(Duration::from_millis(1400)).await;
    assert_no_notification!(setup.notifications);
    assert_eq!(setup.supervisor.generation(), 2);
    assert_eq!(setup.connector.connect_attempts(), endpoints(&[PROVIDER_A, PROVIDER_B]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_watchdog_stays_quiet() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    setup.supervisor.listen(counter_request().keep_alive(KEEP_ALIVE)).await?;
    await_notification!(setup.notifications, Notification::Subscribed { .. });

    setup.supervisor.unsubscribe(COUNTER_ADDRESS, "CountIncreased");
    sleep(Duration::from_secs(5)).await;

    assert_no_notification!(setup.notifications);
    assert_eq!(setup.supervisor.generation(), 1);
    Ok(())
}
