use event_supervisor::{
    Notification, ResetReason, StreamEvent, SupervisorStatus, await_notification,
    test_utils::{counter_key, counter_request, endpoints, transport_error},
};

use crate::common::{PROVIDER_A, PROVIDER_B, setup_connected};

#[tokio::test]
async fn stream_error_resets_connection() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    setup.supervisor.listen(counter_request()).await?;

    setup.connector.emit(&key, StreamEvent::Error(transport_error("connection reset by peer")));

    let started = await_notification!(setup.notifications, Notification::ResetStarted { .. });
    assert_eq!(
        started,
        Notification::ResetStarted { generation: 2, reason: ResetReason::StreamError(key.clone()) }
    );
    let completed = await_notification!(setup.notifications, Notification::ResetCompleted { .. });
    assert_eq!(
        completed,
        Notification::ResetCompleted { generation: 2, replayed: 1, registered: 1 }
    );

    assert_eq!(setup.connector.connect_attempts(), endpoints(&[PROVIDER_A, PROVIDER_B]));
    assert_eq!(setup.supervisor.live_subscriptions(), vec![key]);
    Ok(())
}

#[tokio::test]
async fn failed_listen_escalates_to_reset() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    setup.connector.fail_subscribe(&key);

    // the registration is kept even though the stream could not be opened
    setup.supervisor.listen(counter_request()).await?;
    assert_eq!(setup.supervisor.registered(), vec![key.clone()]);

    let started = await_notification!(setup.notifications, Notification::ResetStarted { .. });
    assert_eq!(
        started,
        Notification::ResetStarted {
            generation: 2,
            reason: ResetReason::SubscribeFailed(key.clone())
        }
    );
    // replay failures are logged, not escalated again
    let completed = await_notification!(setup.notifications, Notification::ResetCompleted { .. });
    assert_eq!(
        completed,
        Notification::ResetCompleted { generation: 2, replayed: 0, registered: 1 }
    );
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Ready);
    assert_eq!(setup.supervisor.generation(), 2);

    setup.connector.recover_subscribe(&key);
    setup.supervisor.reset_connection().await?;
    assert_eq!(setup.supervisor.live_subscriptions(), vec![key]);
    Ok(())
}

#[tokio::test]
async fn replay_continues_past_failures() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    let increased = counter_key("CountIncreased");
    let decreased = counter_key("CountDecreased");
    setup.supervisor.listen(counter_request()).await?;
    setup.supervisor.listen(counter_request().event("CountDecreased")).await?;
    setup.connector.fail_subscribe(&increased);

    setup.supervisor.reset_connection().await?;

    let completed = await_notification!(setup.notifications, Notification::ResetCompleted { .. });
    assert_eq!(
        completed,
        Notification::ResetCompleted { generation: 2, replayed: 1, registered: 2 }
    );
    assert_eq!(setup.supervisor.registered(), vec![increased, decreased.clone()]);
    assert_eq!(setup.supervisor.live_subscriptions(), vec![decreased]);
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Active);
    Ok(())
}
