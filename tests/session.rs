//! Channel session behaviour through the registry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;

use pubnub_socket::{
    ConnectionParams, ConnectionParamsBuilder, SessionEvent, SessionListener, SessionState,
    Timetoken,
};

use common::{MockTransport, StreamScript, Tail, init_logging, registry, wait_until};

fn params(channel: &str) -> ConnectionParams {
    ConnectionParamsBuilder::new()
        .origin("test.local")
        .channel(channel)
        .user_id("tester")
        .build()
        .expect("params")
}

fn collector() -> (SessionListener, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener: SessionListener = Arc::new(move |event: &SessionEvent| {
        let _ = tx.send(event.clone());
    });
    (listener, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("listener dropped")
}

#[tokio::test]
async fn test_messages_delivered_in_envelope_order() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([StreamScript::Chunks(
        vec![
            b"[[\"m1\",\"m2\"],\"10".to_vec(),
            b"0\"]\n[[\"m3\"],".to_vec(),
            b"\"101\"]\n".to_vec(),
        ],
        Tail::Pending,
    )]);
    let registry = registry(transport);
    let (listener, mut rx) = collector();
    let _handle = registry.acquire(&params("room"), listener);

    assert_eq!(
        next(&mut rx).await,
        SessionEvent::Connect {
            cursor: Timetoken::new("100")
        }
    );
    assert_eq!(next(&mut rx).await, SessionEvent::Message(json!("m1")));
    assert_eq!(next(&mut rx).await, SessionEvent::Message(json!("m2")));
    assert_eq!(next(&mut rx).await, SessionEvent::Message(json!("m3")));

    let session = registry.session(&params("room")).expect("session");
    assert_eq!(session.cursor().as_str(), "101");
    assert_eq!(session.state(), SessionState::Streaming);
    Ok(())
}

#[tokio::test]
async fn test_fan_out_uses_one_stream() -> anyhow::Result<()> {
    init_logging();
    let (script, tx) = StreamScript::live();
    let transport = MockTransport::with_scripts([script]);
    let registry = registry(Arc::clone(&transport));

    let (first, mut first_rx) = collector();
    let (second, mut second_rx) = collector();
    let _a = registry.acquire(&params("room"), first);
    let _b = registry.acquire(&params("room"), second);

    assert!(wait_until(|| transport.subscribe_count() == 1).await);
    tx.send(Ok(Bytes::from_static(b"[[\"x\",\"y\"],\"5\"]\n")))?;

    for rx in [&mut first_rx, &mut second_rx] {
        assert!(matches!(next(rx).await, SessionEvent::Connect { .. }));
        assert_eq!(next(rx).await, SessionEvent::Message(json!("x")));
        assert_eq!(next(rx).await, SessionEvent::Message(json!("y")));
    }

    assert_eq!(transport.subscribe_count(), 1);
    assert_eq!(transport.max_open_streams(), 1);
    assert_eq!(registry.session_count(), 1);
    assert_eq!(registry.listener_count(&params("room")), 2);
    Ok(())
}

#[tokio::test]
async fn test_failure_resumes_from_last_cursor() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([
        StreamScript::records(&[r#"[["a"],"100"]"#], Tail::Fail),
        StreamScript::records(&[r#"[["b"],"101"]"#], Tail::Pending),
    ]);
    let registry = registry(Arc::clone(&transport));
    let (listener, mut rx) = collector();
    let _handle = registry.acquire(&params("room"), listener);

    assert!(matches!(next(&mut rx).await, SessionEvent::Connect { .. }));
    assert_eq!(next(&mut rx).await, SessionEvent::Message(json!("a")));
    assert!(matches!(next(&mut rx).await, SessionEvent::Disconnect { .. }));
    assert_eq!(next(&mut rx).await, SessionEvent::Reconnect);
    assert_eq!(next(&mut rx).await, SessionEvent::Message(json!("b")));

    let requests = transport.subscribe_requests();
    assert_eq!(requests[0].cursor.as_str(), "0");
    assert_eq!(requests[1].cursor.as_str(), "100");
    assert!(requests[1].url.path().ends_with("/stream/demo-36/room/0/100"));
    Ok(())
}

#[tokio::test]
async fn test_end_of_stream_restarts_quickly() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([StreamScript::records(
        &[r#"[[],"7"]"#],
        Tail::End,
    )]);
    let registry = registry(Arc::clone(&transport));
    let (listener, mut rx) = collector();
    let _handle = registry.acquire(&params("room"), listener);

    assert!(matches!(next(&mut rx).await, SessionEvent::Connect { .. }));
    assert!(wait_until(|| transport.subscribe_count() == 2).await);
    assert_eq!(transport.subscribe_requests()[1].cursor.as_str(), "7");

    // A clean end is not a failure.
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_refused_connection_is_retried() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([
        StreamScript::Refuse,
        StreamScript::Reject(429),
        StreamScript::records(&[r#"[["ok"],"9"]"#], Tail::Pending),
    ]);
    let registry = registry(Arc::clone(&transport));
    let (listener, mut rx) = collector();
    let _handle = registry.acquire(&params("room"), listener);

    assert!(matches!(next(&mut rx).await, SessionEvent::Connect { .. }));
    assert_eq!(next(&mut rx).await, SessionEvent::Message(json!("ok")));
    assert_eq!(transport.subscribe_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_rejection_stops_session() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([StreamScript::Reject(403)]);
    let registry = registry(Arc::clone(&transport));
    let (listener, mut rx) = collector();
    let _handle = registry.acquire(&params("room"), listener);

    match next(&mut rx).await {
        SessionEvent::Error { reason } => assert!(reason.contains("403")),
        other => panic!("expected error, got {other:?}"),
    }

    let session = registry.session(&params("room")).expect("session");
    assert!(wait_until(|| session.state() == SessionState::Stopped).await);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(transport.subscribe_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_release_cancels_in_flight_read() -> anyhow::Result<()> {
    init_logging();
    let (script, tx) = StreamScript::live();
    let transport = MockTransport::with_scripts([script]);
    let registry = registry(Arc::clone(&transport));
    let (listener, mut rx) = collector();
    let handle = registry.acquire(&params("room"), listener);

    tx.send(Ok(Bytes::from_static(b"[[\"first\"],\"1\"]\n")))?;
    assert!(matches!(next(&mut rx).await, SessionEvent::Connect { .. }));
    assert_eq!(next(&mut rx).await, SessionEvent::Message(json!("first")));

    let session = registry.session(&params("room")).expect("session");
    assert!(registry.release(&handle));
    assert!(session.is_stopped());
    assert_eq!(registry.session_count(), 0);

    let _ = tx.send(Ok(Bytes::from_static(b"[[\"second\"],\"2\"]\n")));
    assert!(wait_until(|| transport.open_streams() == 0).await);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(transport.subscribe_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_resume_from_configured_timetoken() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::new();
    let registry = registry(Arc::clone(&transport));
    let params = ConnectionParamsBuilder::new()
        .origin("test.local")
        .channel("room")
        .timetoken("555")
        .build()?;

    let (listener, _rx) = collector();
    let _handle = registry.acquire(&params, listener);

    assert!(wait_until(|| transport.subscribe_count() == 1).await);
    assert_eq!(transport.subscribe_requests()[0].cursor.as_str(), "555");
    Ok(())
}

#[tokio::test]
async fn test_message_receiver_pulls_in_order() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([StreamScript::records(
        &[r#"[["a","b"],"1"]"#, r#"[["c"],"2"]"#],
        Tail::Pending,
    )]);
    let registry = registry(transport);
    let mut receiver = registry.subscribe_messages(&params("room"), 16);

    assert_eq!(receiver.channel().as_str(), "room");
    for expected in ["a", "b", "c"] {
        let value = tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await?;
        assert_eq!(value, Some(json!(expected)));
    }

    drop(receiver);
    assert_eq!(registry.session_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_message_receiver_drops_when_full() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([StreamScript::records(
        &[r#"[["a","b","c"],"1"]"#],
        Tail::Pending,
    )]);
    let registry = registry(transport);
    let mut receiver = registry.subscribe_messages(&params("room"), 1);

    let first = tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await?;
    assert_eq!(first, Some(json!("a")));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(receiver.try_recv(), None);
    Ok(())
}

#[tokio::test]
async fn test_message_receiver_ends_on_rejection() -> anyhow::Result<()> {
    init_logging();
    let transport = MockTransport::with_scripts([StreamScript::Reject(404)]);
    let registry = registry(transport);
    let mut receiver = registry.subscribe_messages(&params("room"), 4);

    let end = tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await?;
    assert_eq!(end, None);
    Ok(())
}

#[tokio::test]
async fn test_message_receiver_as_stream() -> anyhow::Result<()> {
    use tokio_test::{assert_pending, assert_ready_eq};

    init_logging();
    let transport = MockTransport::with_scripts([StreamScript::records(
        &[r#"[["a"],"1"]"#],
        Tail::Pending,
    )]);
    let registry = registry(transport);
    let mut stream = tokio_test::task::spawn(registry.subscribe_messages(&params("room"), 4));

    assert_pending!(stream.poll_next());
    assert!(wait_until(|| stream.is_woken()).await);
    assert_ready_eq!(stream.poll_next(), Some(json!("a")));
    Ok(())
}
