use event_supervisor::{
    Notification, ResetReason, StreamEvent, SupervisorStatus, assert_next_notification,
    await_notification,
    test_utils::{counter_key, counter_request, endpoints, log_at},
};

use crate::common::{PROVIDER_A, PROVIDER_B, PROVIDER_C, collect_data, recv, setup_connected};

#[tokio::test]
async fn reset_rotates_and_replays() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    let key = counter_key("CountIncreased");
    let (request, mut data) = collect_data(counter_request());
    setup.supervisor.listen(request).await?;
    await_notification!(setup.notifications, Notification::Subscribed { .. });

    setup.supervisor.reset_connection().await?;

    assert_next_notification!(
        setup.notifications,
        Notification::ResetStarted { generation: 2, reason: ResetReason::Manual }
    );
    assert_next_notification!(
        setup.notifications,
        Notification::ProviderRotated { endpoint: PROVIDER_B.into() }
    );
    assert_next_notification!(
        setup.notifications,
        Notification::Connected { endpoint: PROVIDER_B.into() }
    );
    assert_next_notification!(
        setup.notifications,
        Notification::Subscribed { key: key.clone(), generation: 2 }
    );
    assert_next_notification!(
        setup.notifications,
        Notification::ResetCompleted { generation: 2, replayed: 1, registered: 1 }
    );

    assert_eq!(setup.connector.connect_attempts(), endpoints(&[PROVIDER_A, PROVIDER_B]));
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Active);
    assert_eq!(setup.supervisor.connection_epoch(), 2);

    setup.connector.emit(&key, StreamEvent::Data(log_at(20)));
    assert_eq!(recv(&mut data).await.block_number, Some(20));
    Ok(())
}

#[tokio::test]
async fn rotation_wraps_around() -> anyhow::Result<()> {
    let setup = setup_connected().await?;

    for expected in [PROVIDER_B, PROVIDER_C, PROVIDER_A] {
        setup.supervisor.reset_connection().await?;
        assert_eq!(setup.supervisor.current_provider(), Some(expected.into()));
    }

    assert_eq!(
        setup.connector.connect_attempts(),
        endpoints(&[PROVIDER_A, PROVIDER_B, PROVIDER_C, PROVIDER_A])
    );
    assert_eq!(setup.supervisor.generation(), 4);
    assert_eq!(setup.supervisor.status(), SupervisorStatus::Ready);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unreachable_provider_is_skipped() -> anyhow::Result<()> {
    let mut setup = setup_connected().await?;
    setup.connector.fail_connect(PROVIDER_B);
    setup.supervisor.listen(counter_request()).await?;

    setup.supervisor.reset_connection().await?;

    let rotated = await_notification!(setup.notifications, Notification::ProviderRotated { .. });
    assert_eq!(rotated, Notification::ProviderRotated { endpoint: PROVIDER_B.into() });
    assert_next_notification!(
        setup.notifications,
        Notification::ProviderRotated { endpoint: PROVIDER_C.into() }
    );
    assert_next_notification!(
        setup.notifications,
        Notification::Connected { endpoint: PROVIDER_C.into() }
    );

    assert_eq!(
        setup.connector.connect_attempts(),
        endpoints(&[PROVIDER_A, PROVIDER_B, PROVIDER_C])
    );
    assert_eq!(setup.supervisor.live_subscriptions(), vec![counter_key("CountIncreased")]);
    Ok(())
}
