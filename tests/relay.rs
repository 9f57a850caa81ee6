use futures_util::{SinkExt, StreamExt};
use peerlink_lib::peer::{CallId, Role, SessionHandle, SessionInput};
use peerlink_lib::signaling::relay::RelayTransport;
use peerlink_lib::signaling::relay_server::RelayServer;
use peerlink_lib::signaling::{Rendezvous, SignalMessage, SignalTransport};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn start_relay() -> String {
    let server = RelayServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("ws://{addr}")
}

async fn next(inbox: &mut UnboundedReceiver<SessionInput>) -> SessionInput {
    tokio::time::timeout(Duration::from_secs(5), inbox.recv())
        .await
        .expect("nothing arrived from the relay")
        .expect("inbox closed")
}

#[tokio::test]
async fn relay_pairs_caller_and_callee() {
    let url = start_relay().await;
    let call_id = CallId::new("room-1").unwrap();

    let (caller_handle, mut caller_inbox) = SessionHandle::channel();
    let mut caller = RelayTransport::connect(&url, Role::Initiator, &call_id, caller_handle)
        .await
        .unwrap();
    assert!(caller.awaits_peer());
    // sent before the callee exists; the relay holds it
    caller
        .send(SignalMessage::Offer { sdp: "S1".into() })
        .unwrap();

    let (callee_handle, mut callee_inbox) = SessionHandle::channel();
    let mut callee = RelayTransport::connect(&url, Role::Responder, &call_id, callee_handle)
        .await
        .unwrap();
    assert!(!callee.awaits_peer());

    assert!(matches!(
        next(&mut caller_inbox).await,
        SessionInput::Signal(SignalMessage::Calling)
    ));
    assert!(matches!(
        next(&mut callee_inbox).await,
        SessionInput::Signal(SignalMessage::Offer { sdp }) if sdp == "S1"
    ));

    callee
        .send(SignalMessage::Answer { sdp: "S2".into() })
        .unwrap();
    assert!(matches!(
        next(&mut caller_inbox).await,
        SessionInput::Signal(SignalMessage::Answer { sdp }) if sdp == "S2"
    ));
}

#[tokio::test]
async fn relay_mints_an_id_for_a_caller_without_one() {
    let url = start_relay().await;
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    ws.send(Message::Text(r#"{"role":"caller"}"#.into()))
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(text) = reply else {
        panic!("expected a text frame, got {reply:?}");
    };
    let hello: Rendezvous = serde_json::from_str(&text).unwrap();
    assert_eq!(hello.role, Role::Initiator);
    assert_eq!(hello.call_id.unwrap().as_str().len(), 16);
}

#[tokio::test]
async fn relay_rejects_a_second_callee() {
    let url = start_relay().await;
    let call_id = CallId::new("room-2").unwrap();

    let (caller_handle, mut caller_inbox) = SessionHandle::channel();
    let _caller = RelayTransport::connect(&url, Role::Initiator, &call_id, caller_handle)
        .await
        .unwrap();
    let (callee_handle, _callee_inbox) = SessionHandle::channel();
    let _callee = RelayTransport::connect(&url, Role::Responder, &call_id, callee_handle)
        .await
        .unwrap();
    // both are registered once the callee's calling signal came through
    assert!(matches!(
        next(&mut caller_inbox).await,
        SessionInput::Signal(SignalMessage::Calling)
    ));

    let (extra_handle, mut extra_inbox) = SessionHandle::channel();
    let _extra = RelayTransport::connect(&url, Role::Responder, &call_id, extra_handle)
        .await
        .unwrap();
    assert!(matches!(next(&mut extra_inbox).await, SessionInput::TransportClosed));
}

#[tokio::test]
async fn relay_drops_a_callee_with_a_blank_call_id() {
    let url = start_relay().await;
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    ws.send(Message::Text(r#"{"role":"callee","callId":"   "}"#.into()))
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("relay kept the connection open");
    assert!(
        !matches!(reply, Some(Ok(Message::Text(_)))),
        "blank call id was accepted: {reply:?}"
    );
}
