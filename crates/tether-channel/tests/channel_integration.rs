//! Integration tests for the agent channel session against a local
//! WebSocket server speaking the envelope protocol.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use tether_channel::ChannelSession;
use tether_core::config::ChannelConfig;
use tether_core::error::ChannelError;
use tether_core::{ConnectionState, ServiceDescriptor};

const ACCEPT_FRAME: &str = r#"{"type":"ConnectionAccepted","payload":{},"id":"s0","timestamp":1}"#;
const REJECT_FRAME: &str =
    r#"{"type":"ConnectionRejected","payload":{"reason":"incompatible"},"id":"s0","timestamp":1}"#;

/// What the fake agent service does after validating the handshake
enum ServerScript {
    /// Accept, then stream the given frames and hold the connection open
    Accept(Vec<&'static str>),
    /// Reject the handshake
    Reject,
    /// Accept, then immediately close the connection
    AcceptThenClose,
}

fn descriptor(addr: SocketAddr) -> ServiceDescriptor {
    ServiceDescriptor {
        name: "Agent-A".to_string(),
        endpoint: format!("ws://{}", addr),
        version: "1.0".to_string(),
        platform: "test".to_string(),
        capabilities: vec!["chat".to_string()],
    }
}

async fn spawn_server(script: ServerScript) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // First frame must be the client handshake
        let first = ws.next().await.unwrap().unwrap();
        let text = first.into_text().unwrap();
        assert!(text.contains("ClientHandshake"), "expected handshake, got {}", text);

        match script {
            ServerScript::Reject => {
                ws.send(WsMessage::Text(REJECT_FRAME.to_string())).await.unwrap();
                let _ = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
            }
            ServerScript::Accept(frames) => {
                ws.send(WsMessage::Text(ACCEPT_FRAME.to_string())).await.unwrap();
                for frame in frames {
                    ws.send(WsMessage::Text(frame.to_string())).await.unwrap();
                }
                // Hold the connection open until the client goes away
                while let Some(Ok(_)) = ws.next().await {}
            }
            ServerScript::AcceptThenClose => {
                ws.send(WsMessage::Text(ACCEPT_FRAME.to_string())).await.unwrap();
                let _ = ws.close(None).await;
            }
        }
    });

    addr
}

async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    predicate: impl Fn(&ConnectionState) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if predicate(&rx.borrow()) {
                break;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("state never reached");
}

#[tokio::test]
async fn test_connect_and_coalesce_streaming_message() {
    let addr = spawn_server(ServerScript::Accept(vec![
        r#"{"type":"ConversationUpdate","payload":{"messageId":"m1","role":"assistant","text":"Hel","partial":true},"id":"f1","timestamp":2,"isStreaming":true}"#,
        r#"{"type":"ConversationUpdate","payload":{"messageId":"m1","role":"assistant","text":"Hello","partial":false},"id":"f2","timestamp":3,"isFinal":true}"#,
    ]))
    .await;

    let session = ChannelSession::new(ChannelConfig::default());
    session.connect(&descriptor(addr)).await.unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(session.endpoint().await, Some(format!("ws://{}", addr)));

    let mut messages = session.messages();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let visible = messages.borrow();
                if visible.len() == 1 && visible[0].text == "Hello" && !visible[0].partial {
                    break;
                }
            }
            messages.changed().await.unwrap();
        }
    })
    .await
    .expect("coalesced message never arrived");

    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.endpoint().await, None);
}

#[tokio::test]
async fn test_rejected_handshake_fails_session() {
    let addr = spawn_server(ServerScript::Reject).await;

    let session = ChannelSession::new(ChannelConfig::default());
    let err = session.connect(&descriptor(addr)).await.unwrap_err();
    assert!(matches!(err, ChannelError::HandshakeRejected(_)));

    match session.state() {
        ConnectionState::Failed(reason) => assert!(reason.contains("incompatible")),
        other => panic!("expected Failed, got {:?}", other),
    }

    // Failed -> Disconnected only via explicit disconnect
    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_refused_fails_session() {
    // Grab a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = ChannelSession::new(ChannelConfig::default());
    let err = session.connect(&descriptor(addr)).await.unwrap_err();
    assert!(matches!(err, ChannelError::TransportLost(_)));
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn test_server_close_transitions_to_failed() {
    let addr = spawn_server(ServerScript::AcceptThenClose).await;

    let session = ChannelSession::new(ChannelConfig::default());
    session.connect(&descriptor(addr)).await.unwrap();

    let mut state = session.subscribe_state();
    wait_for_state(&mut state, |s| matches!(s, ConnectionState::Failed(_))).await;
}

#[tokio::test]
async fn test_disconnect_is_idempotent_from_any_state() {
    let session = ChannelSession::new(ChannelConfig::default());

    // Never connected
    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);

    // Twice in a row
    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);

    // Sending while disconnected is a logged no-op
    session
        .send(tether_protocol::AgentMessage::Ping)
        .await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
}
