//! Handshake, steady-state framing and health monitoring.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::Harness;
use lifeline_core::{
    error::{SessionClosed, SessionError},
    frame::FrameError,
    presenter::FatalNotice,
    session::{SessionEvent, SessionState},
    test_utils::{flush, MockTransportFactory, Shown},
    transport::TransportKind,
};
use testresult::TestResult;

#[tokio::test(start_paused = true)]
async fn end_to_end_reconnect_with_fresh_credentials() -> TestResult {
    let h = Harness::start();
    h.session.init("S1", "T1").await?;
    flush().await;

    assert_eq!(h.factory.count(), 1);
    let first = h.transport();
    assert_eq!(first.kind(), TransportKind::Persistent);
    assert_eq!(first.open_calls(), 1);

    first.fire_open();
    flush().await;
    assert_eq!(first.sent(), vec!["sid=S1&tok=T1&".to_owned()]);
    assert_eq!(h.session.status().state, SessionState::Handshaking);

    first.fire_message("I1&K1");
    flush().await;

    let status = h.session.status();
    assert_eq!(status.state, SessionState::Ready);
    assert_eq!(status.reconnect_count, 0);
    assert_eq!(status.instance_id.as_ref().map(|i| i.as_str()), Some("I1"));
    assert_eq!(h.drain_events(), vec![SessionEvent::Ready]);

    h.reconnect.push_credentials("S2", "T2");
    first.fire_close();
    flush().await;

    assert_eq!(h.presenter.count(&Shown::ConnectionLost), 1);
    let status = h.session.status();
    assert_eq!(status.state, SessionState::Reconnecting);
    assert_eq!(status.reconnect_count, 1);
    assert!(first.is_detached());

    tokio::time::sleep(Duration::from_millis(1_499)).await;
    assert!(h.reconnect.requests().is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    flush().await;
    let requests = h.reconnect.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].as_str(), "I1");

    // The new cycle waits for the previous transport to settle.
    assert_eq!(h.factory.count(), 1);
    tokio::time::sleep(Duration::from_millis(300)).await;
    flush().await;
    assert_eq!(h.factory.count(), 2);

    let second = h.transport();
    assert_eq!(second.kind(), TransportKind::Persistent);
    second.fire_open();
    flush().await;
    assert_eq!(second.sent(), vec!["sid=S2&tok=T2&".to_owned()]);

    second.fire_message("I2&K9");
    flush().await;
    assert_eq!(h.session.status().state, SessionState::Ready);
    assert_eq!(h.drain_events(), vec![SessionEvent::Reconnected]);
    assert_eq!(h.presenter.count(&Shown::ConnectionRestored), 2);

    Ok(())
}

#[test]
fn outbound_frames_echo_the_latest_token() {
    bolero::check!()
        .with_type::<Vec<String>>()
        .for_each(|tokens| {
            let tokens: Vec<String> = tokens
                .iter()
                .take(8)
                .map(|t| t.replace('&', ""))
                .collect();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .expect("runtime");
            runtime.block_on(echo_each_token(&tokens));
        });
}

/// Rotate through `tokens`, checking every outbound frame carries the most
/// recent one.
async fn echo_each_token(tokens: &[String]) {
    let h = Harness::start();
    let transport = h.ready().await;
    let mut expected = "K1".to_owned();

    for (i, next) in tokens.iter().enumerate() {
        let n = i.to_string();
        assert!(h.session.send("tick", &[("n", n.as_str())]).await);
        assert_eq!(
            transport.last_sent(),
            Some(format!("sid=S1&tok={expected}&tsk=tick&n={n}&"))
        );

        transport.fire_message(&format!("{next}&payload-{i}"));
        flush().await;
        expected.clone_from(next);
    }

    assert!(h.session.send("done", &[]).await);
    assert_eq!(
        transport.last_sent(),
        Some(format!("sid=S1&tok={expected}&tsk=done&"))
    );

    let messages: Vec<_> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Message(m) => Some(m),
            _ => None,
        })
        .collect();
    let expected_messages: Vec<_> = (0..tokens.len()).map(|i| format!("payload-{i}")).collect();
    assert_eq!(messages, expected_messages);
}

#[tokio::test(start_paused = true)]
async fn field_values_are_escaped() -> TestResult {
    let h = Harness::start();
    let transport = h.ready().await;

    assert!(
        h.session
            .send("save", &[("path", r"C:\tmp"), ("q", "a&b")])
            .await
    );
    assert_eq!(
        transport.last_sent().as_deref(),
        Some(r"sid=S1&tok=K1&tsk=save&path=C:\\tmp&q=a\&b&")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ping_is_answered_and_never_delivered() -> TestResult {
    let h = Harness::start();
    let transport = h.ready().await;
    h.drain_events();

    tokio::time::sleep(Duration::from_secs(30)).await;
    transport.fire_message("K2&ping");
    flush().await;

    assert_eq!(transport.sent().len(), 2);
    assert_eq!(
        transport.last_sent().as_deref(),
        Some("sid=S1&tok=K2&tsk=pong&")
    );
    assert!(h.drain_events().is_empty());

    // The ping restarted the silence timer.
    tokio::time::sleep(Duration::from_secs(30)).await;
    flush().await;
    assert!(!h.session.status().connection_lost);

    tokio::time::sleep(Duration::from_secs(11)).await;
    flush().await;
    assert!(h.session.status().connection_lost);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silence_marks_the_connection_lost() -> TestResult {
    let h = Harness::start();
    let transport = h.ready().await;

    tokio::time::sleep(Duration::from_millis(39_999)).await;
    flush().await;
    assert!(!h.session.status().connection_lost);

    tokio::time::sleep(Duration::from_millis(2)).await;
    flush().await;
    assert!(h.session.status().connection_lost);
    assert_eq!(h.presenter.count(&Shown::ConnectionLost), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    flush().await;
    assert!(h.session.status().connection_lost);
    assert_eq!(h.session.status().state, SessionState::Ready);

    let restored_before = h.presenter.count(&Shown::ConnectionRestored);
    transport.fire_message("K2&");
    flush().await;
    assert!(!h.session.status().connection_lost);
    assert_eq!(
        h.presenter.count(&Shown::ConnectionRestored),
        restored_before + 1
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn sending_while_lost_starts_a_reconnect() -> TestResult {
    let h = Harness::start();
    let transport = h.ready().await;

    tokio::time::sleep(Duration::from_secs(41)).await;
    flush().await;
    assert!(h.session.status().connection_lost);

    assert!(!h.session.send("click", &[]).await);
    flush().await;

    assert_eq!(transport.sent().len(), 1);
    assert!(transport.is_detached());
    assert_eq!(transport.resets(), 1);
    let status = h.session.status();
    assert_eq!(status.state, SessionState::Reconnecting);
    assert_eq!(status.reconnect_count, 1);

    h.reconnect.push_credentials("S2", "T2");
    tokio::time::sleep(Duration::from_millis(1_500 + 300 + 50)).await;
    flush().await;
    let second = h.transport();
    second.fire_open();
    flush().await;
    second.fire_message("I1&K5");
    flush().await;

    let status = h.session.status();
    assert_eq!(status.state, SessionState::Ready);
    assert!(!status.connection_lost);
    // Once for the first handshake, once for the reconnect.
    assert_eq!(h.presenter.count(&Shown::ConnectionRestored), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn invalid_request_and_empty_frames_are_ignored() -> TestResult {
    let h = Harness::start();
    let transport = h.ready().await;
    h.drain_events();

    transport.fire_message("invalid_request");
    transport.fire_message("");
    transport.fire_message("K2&");
    flush().await;

    assert_eq!(h.session.status().state, SessionState::Ready);
    assert!(h.drain_events().is_empty());
    assert!(h.session.send("a", &[]).await);
    assert_eq!(
        transport.last_sent().as_deref(),
        Some("sid=S1&tok=K2&tsk=a&")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_delimiter_is_fatal() -> TestResult {
    let h = Harness::start();
    let transport = h.ready().await;
    h.drain_events();

    transport.fire_message("garbage");
    flush().await;

    assert_eq!(h.session.status().state, SessionState::Failed);
    assert_eq!(
        h.drain_events(),
        vec![SessionEvent::Error(SessionError::Framing {
            data: "garbage".into()
        })]
    );
    assert_eq!(
        h.presenter.last_fatal(),
        Some(FatalNotice::invalid_data("garbage"))
    );
    assert_eq!(transport.resets(), 1);

    // Not retried.
    tokio::time::sleep(Duration::from_secs(10)).await;
    flush().await;
    assert!(h.reconnect.requests().is_empty());
    assert_eq!(h.factory.count(), 1);
    assert!(!h.session.send("a", &[]).await);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_identity_is_ignored() -> TestResult {
    let h = Harness::start();
    h.session.init("", "T1").await?;
    h.session.init("S1", "").await?;
    flush().await;

    assert_eq!(h.factory.count(), 0);
    assert_eq!(h.session.status().state, SessionState::Idle);
    assert!(!h.session.send("a", &[]).await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_is_refused_until_the_handshake_completes() -> TestResult {
    let h = Harness::start();
    h.session.init("S1", "T1").await?;
    flush().await;
    assert!(!h.session.send("early", &[]).await);

    let transport = h.transport();
    transport.fire_open();
    flush().await;
    assert!(!h.session.send("early", &[]).await);
    assert_eq!(transport.sent().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn forced_fallback_and_missing_persistent_support_use_polling() -> TestResult {
    let h = Harness::start();
    h.session.init_with_fallback("S1", "T1", true).await?;
    flush().await;
    assert_eq!(h.transport().kind(), TransportKind::Polling);

    let h = Harness::with_factory(MockTransportFactory::with_persistent_support(false));
    h.session.init("S1", "T1").await?;
    flush().await;
    assert_eq!(h.transport().kind(), TransportKind::Polling);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn handshake_failure_is_reported_and_counted() -> TestResult {
    let h = Harness::start();
    let first = h.ready().await;
    h.drain_events();

    h.reconnect.push_credentials("S2", "T2");
    first.fire_close();
    flush().await;
    tokio::time::sleep(Duration::from_millis(1_900)).await;
    flush().await;

    let second = h.transport();
    second.fire_open();
    flush().await;
    second.fire_message("invalid_request");
    flush().await;

    assert_eq!(
        h.drain_events(),
        vec![SessionEvent::Error(SessionError::Handshake(
            FrameError::InvalidRequest
        ))]
    );
    let status = h.session.status();
    assert_eq!(status.state, SessionState::Reconnecting);
    assert_eq!(status.reconnect_count, 2);

    // Retries go through the reconnect endpoint with the last good instance.
    tokio::time::sleep(Duration::from_millis(1_501)).await;
    flush().await;
    let requests = h.reconnect.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].as_str(), "I1");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn close_stops_the_session() -> TestResult {
    let h = Harness::start();
    let transport = h.ready().await;

    h.session.close().await?;
    flush().await;

    assert_eq!(transport.resets(), 1);
    assert!(transport.is_detached());
    assert!(!h.session.send("a", &[]).await);
    assert_eq!(h.session.init("S1", "T1").await, Err(SessionClosed));
    Ok(())
}
