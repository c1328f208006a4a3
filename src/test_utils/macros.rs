/// Asserts that the next notification equals the expected one.
///
/// Waits up to `timeout` seconds (default 5). Under paused time the wait auto-advances the clock.
#[macro_export]
macro_rules! assert_next_notification {
    ($receiver: expr, $expected: expr) => {
        $crate::assert_next_notification!($receiver, $expected, timeout = 5)
    };
    ($receiver: expr, $expected: expr, timeout = $secs: expr) => {
        let received = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            $receiver.recv(),
        )
        .await
        .expect("timed out");
        let expected = $expected;
        match received {
            std::result::Result::Ok(notification) => {
                assert_eq!(notification, expected, "Expected {:?}, got {:?}", expected, notification);
            }
            std::result::Result::Err(e) => {
                panic!("Expected {:?}, but receiving failed: {:?}", expected, e);
            }
        }
    };
}

/// Skips notifications until one matches `pattern` and evaluates to it.
#[macro_export]
macro_rules! await_notification {
    ($receiver: expr, $pattern: pat) => {
        $crate::await_notification!($receiver, $pattern, timeout = 5)
    };
    ($receiver: expr, $pattern: pat, timeout = $secs: expr) => {
        tokio::time::timeout(std::time::Duration::from_secs($secs), async {
            loop {
                match $receiver.recv().await {
                    std::result::Result::Ok(notification @ $pattern) => break notification,
                    std::result::Result::Ok(_) => continue,
                    std::result::Result::Err(e) => {
                        panic!("Expected {}, but receiving failed: {:?}", stringify!($pattern), e)
                    }
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", stringify!($pattern)))
    };
}

/// Asserts that no notification is pending.
#[macro_export]
macro_rules! assert_no_notification {
    ($receiver: expr) => {
        match $receiver.try_recv() {
            std::result::Result::Err(tokio::sync::broadcast::error::TryRecvError::Empty) => {}
            other => panic!("Expected no pending notification, got {:?}", other),
        }
    };
}
