//! WebSocket signaling server
//!
//! One accepted TCP connection maps to one broker connection id. Each
//! connection gets a reader task feeding [`ClientMessage`]s into the broker
//! and a writer task draining an unbounded outbound queue, so deliveries from
//! other connections' handlers never contend with this connection's read loop.

use crate::broker::{EventSink, SignalingBroker};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use roomcast_core::protocol::{ClientMessage, ServerEvent};
use roomcast_core::RoomcastError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Server process configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: SocketAddr,
    /// WebSocket `Origin` values accepted during the handshake; empty means
    /// any origin is accepted
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 3000).into(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Outbound queues for all live connections, keyed by connection id
///
/// This is the broker's delivery primitive: an event is serialized once and
/// pushed onto the target connection's queue.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    connections: Arc<DashMap<String, mpsc::UnboundedSender<Message>>>,
}

impl Outbox {
    fn register(&self, connection_id: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(connection_id.to_string(), tx);
        rx
    }

    fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }
}

#[async_trait]
impl EventSink for Outbox {
    async fn deliver(&self, connection_id: &str, event: ServerEvent) -> Result<(), RoomcastError> {
        let sender = self
            .connections
            .get(connection_id)
            .ok_or_else(|| RoomcastError::TargetNotFound {
                target_id: connection_id.to_string(),
            })?;
        let json = serde_json::to_string(&event).map_err(|e| RoomcastError::Transport {
            reason: format!("failed to serialize event: {e}"),
        })?;
        sender
            .send(Message::Text(json))
            .map_err(|_| RoomcastError::Transport {
                reason: format!("connection {connection_id} closed"),
            })
    }
}

/// Signaling server: accept loop plus per-connection reader/writer tasks
#[derive(Debug)]
pub struct SignalingServer {
    listener: TcpListener,
    config: ServerConfig,
    broker: Arc<SignalingBroker<Outbox>>,
    outbox: Outbox,
}

impl SignalingServer {
    /// Bind the listen address and prepare the broker
    pub async fn bind(config: ServerConfig) -> Result<Self, RoomcastError> {
        let listener = TcpListener::bind(config.bind_addr).await.map_err(|e| {
            RoomcastError::ServerStartFailed {
                address: config.bind_addr,
                reason: e.to_string(),
            }
        })?;

        let outbox = Outbox::default();
        Ok(Self {
            listener,
            config,
            broker: Arc::new(SignalingBroker::new(outbox.clone())),
            outbox,
        })
    }

    /// Actual bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, RoomcastError> {
        Ok(self.listener.local_addr()?)
    }

    /// The broker behind this server
    pub fn broker(&self) -> Arc<SignalingBroker<Outbox>> {
        self.broker.clone()
    }

    /// Run the accept loop until the task is cancelled
    pub async fn run(self) -> Result<(), RoomcastError> {
        tracing::info!("Signaling server listening on {}", self.config.bind_addr);

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!("New connection from {}", addr);
                    let broker = self.broker.clone();
                    let outbox = self.outbox.clone();
                    let allowed_origins = self.config.allowed_origins.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, broker, outbox, allowed_origins).await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Drive one WebSocket connection from handshake to disconnect cleanup
async fn handle_connection(
    stream: TcpStream,
    broker: Arc<SignalingBroker<Outbox>>,
    outbox: Outbox,
    allowed_origins: Vec<String>,
) {
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if allowed_origins.is_empty() {
            return Ok(response);
        }
        let origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        match origin {
            Some(origin) if allowed_origins.iter().any(|allowed| allowed == origin) => {
                Ok(response)
            }
            _ => {
                let mut rejection = ErrorResponse::new(Some("origin not allowed".to_string()));
                *rejection.status_mut() = StatusCode::FORBIDDEN;
                Err(rejection)
            }
        }
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let connection_id = Uuid::new_v4().to_string();
    tracing::debug!("WebSocket connection established: {}", connection_id);

    let mut outbound = outbox.register(&connection_id);
    let (mut ws_writer, mut ws_reader) = ws_stream.split();

    // Writer task: drains the outbound queue until the queue closes or the
    // socket errors
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if ws_writer.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_writer.close().await;
    });

    // Read loop
    while let Some(incoming) = ws_reader.next().await {
        match incoming {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    if let Err(e) = broker.handle_message(&connection_id, message).await {
                        tracing::warn!("connection {}: {}", connection_id, e);
                        send_error(&outbox, &connection_id, &e).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Invalid message format: {}", e);
                    let error = RoomcastError::InvalidMessage {
                        reason: e.to_string(),
                    };
                    send_error(&outbox, &connection_id, &error).await;
                }
            },
            Ok(Message::Close(_)) => {
                tracing::debug!("Connection {} closed", connection_id);
                break;
            }
            Err(e) => {
                tracing::error!("WebSocket error on connection {}: {}", connection_id, e);
                break;
            }
            _ => {
                // Ignore other message types (Binary, Ping, Pong)
            }
        }
    }

    // Unregister before the disconnect broadcast so it never targets the
    // departed connection
    outbox.unregister(&connection_id);
    broker.handle_disconnect(&connection_id).await;
    writer.abort();
}

async fn send_error(outbox: &Outbox, connection_id: &str, error: &RoomcastError) {
    let event = ServerEvent::Error {
        error: error.to_string(),
        error_code: error.error_code().to_string(),
    };
    if let Err(e) = outbox.deliver(connection_id, event).await {
        tracing::debug!("could not report error to {}: {}", connection_id, e);
    }
}
