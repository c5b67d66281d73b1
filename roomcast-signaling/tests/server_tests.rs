//! End-to-end tests for the WebSocket signaling server
//!
//! Each test binds an ephemeral port, runs the accept loop in a background
//! task, and drives real `tokio-tungstenite` clients through the join /
//! relay / disconnect flows.

use futures::{SinkExt, StreamExt};
use roomcast_core::protocol::{ClientMessage, ServerEvent};
use roomcast_signaling::{ServerConfig, SignalingServer};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        allowed_origins: Vec::new(),
    };
    let server = SignalingServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (client, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    client
}

async fn send(client: &mut WsClient, message: ClientMessage) {
    let json = serde_json::to_string(&message).unwrap();
    client.send(Message::Text(json)).await.unwrap();
}

async fn next_event(client: &mut WsClient) -> ServerEvent {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn join(client: &mut WsClient, room_id: &str, user_name: &str) -> Vec<String> {
    send(
        client,
        ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
            user_name: user_name.to_string(),
        },
    )
    .await;
    match next_event(client).await {
        ServerEvent::RoomUsers { users } => users.into_iter().map(|u| u.id).collect(),
        other => panic!("expected RoomUsers first, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_roster_and_announce() {
    let addr = start_server().await;

    let mut alice = connect(addr).await;
    let roster = join(&mut alice, "demo", "alice").await;
    assert!(roster.is_empty());

    let mut bob = connect(addr).await;
    let roster = join(&mut bob, "demo", "bob").await;
    assert_eq!(roster.len(), 1);
    let alice_id = roster[0].clone();

    // Alice sees Bob connect
    match next_event(&mut alice).await {
        ServerEvent::UserConnected { user } => {
            assert_eq!(user.user_name, "bob");
            assert_ne!(user.id, alice_id);
        }
        other => panic!("expected UserConnected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_offer_relayed_to_target_only() {
    let addr = start_server().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "demo", "alice").await;

    let mut bob = connect(addr).await;
    let roster = join(&mut bob, "demo", "bob").await;
    let alice_id = roster[0].clone();

    let bob_id = match next_event(&mut alice).await {
        ServerEvent::UserConnected { user } => user.id,
        other => panic!("expected UserConnected, got {other:?}"),
    };

    send(
        &mut alice,
        ClientMessage::SendOffer {
            target_id: bob_id,
            sdp: "v=0...".to_string(),
        },
    )
    .await;

    match next_event(&mut bob).await {
        ServerEvent::Offer { sdp, sender } => {
            assert_eq!(sdp, "v=0...");
            assert_eq!(sender, alice_id);
        }
        other => panic!("expected Offer, got {other:?}"),
    }
}

#[tokio::test]
async fn test_relay_to_unknown_target_reports_error() {
    let addr = start_server().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "demo", "alice").await;

    send(
        &mut alice,
        ClientMessage::SendOffer {
            target_id: "no-such-connection".to_string(),
            sdp: "v=0".to_string(),
        },
    )
    .await;

    match next_event(&mut alice).await {
        ServerEvent::Error { error_code, .. } => assert_eq!(error_code, "TARGET_NOT_FOUND"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_broadcast() {
    let addr = start_server().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "demo", "alice").await;

    let mut bob = connect(addr).await;
    join(&mut bob, "demo", "bob").await;

    let bob_id = match next_event(&mut alice).await {
        ServerEvent::UserConnected { user } => user.id,
        other => panic!("expected UserConnected, got {other:?}"),
    };

    bob.close(None).await.unwrap();

    match next_event(&mut alice).await {
        ServerEvent::UserDisconnected { user_id } => assert_eq!(user_id, bob_id),
        other => panic!("expected UserDisconnected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_message_reports_invalid() {
    let addr = start_server().await;

    let mut alice = connect(addr).await;
    alice
        .send(Message::Text("not json at all".to_string()))
        .await
        .unwrap();

    match next_event(&mut alice).await {
        ServerEvent::Error { error_code, .. } => assert_eq!(error_code, "INVALID_MESSAGE"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_origin_allow_list_rejects_unknown_origin() {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        allowed_origins: vec!["https://example.com".to_string()],
    };
    let server = SignalingServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // No Origin header at all: rejected
    let result = connect_async(format!("ws://{addr}")).await;
    assert!(result.is_err());
}
