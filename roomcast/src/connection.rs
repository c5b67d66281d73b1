//! Peer-side connection facade
//!
//! [`RoomConnection`] turns inbound broker events into typed [`RoomEvent`]s on
//! a single stream and exposes the outbound intents (join, offer/answer/ICE,
//! video frames, chat, media state). Every outbound call checks the transport
//! state first and fails with `NotConnected` rather than silently dropping.

use crate::event::{EventStream, RoomEvent};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use roomcast_core::protocol::{ClientMessage, RoomUser, ServerEvent, VideoFrameMessage};
use roomcast_core::RoomcastError;
use roomcast_media::FrameDelivery;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Client handle to the signaling broker
///
/// Cheap to clone; all clones share one underlying WebSocket connection.
#[derive(Debug, Clone)]
pub struct RoomConnection {
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Message>,
    room_users: Arc<Mutex<Vec<RoomUser>>>,
}

impl RoomConnection {
    /// Connect to a signaling server, e.g. `ws://127.0.0.1:3000`
    ///
    /// Returns the connection handle and the stream of typed room events.
    pub async fn connect(server_url: &str) -> Result<(Self, EventStream), RoomcastError> {
        let (ws_stream, _) =
            connect_async(server_url)
                .await
                .map_err(|e| RoomcastError::Transport {
                    reason: e.to_string(),
                })?;
        debug!("connected to signaling server at {}", server_url);

        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<RoomEvent>();
        let connected = Arc::new(AtomicBool::new(true));
        let room_users = Arc::new(Mutex::new(Vec::new()));

        // Writer task
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if ws_writer.send(message).await.is_err() {
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        // Reader task: translate server events, keep the roster cache fresh,
        // and flip the connected flag when the transport goes away
        let reader_flag = connected.clone();
        let reader_users = room_users.clone();
        tokio::spawn(async move {
            while let Some(incoming) = ws_reader.next().await {
                match incoming {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            update_roster(&reader_users, &event);
                            if event_tx.send(RoomEvent::from(event)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("unparseable server event: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        warn!("websocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            reader_flag.store(false, Ordering::Release);
            let _ = event_tx.send(RoomEvent::Disconnected);
        });

        Ok((
            Self {
                connected,
                outbound,
                room_users,
            },
            EventStream::new(event_rx),
        ))
    }

    /// Whether the underlying transport is still up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Cached roster of the joined room, as last reported by the broker
    pub fn room_users(&self) -> Vec<RoomUser> {
        self.room_users.lock().clone()
    }

    /// Join a room under a display name
    pub fn join_room(&self, room_id: &str, user_name: &str) -> Result<(), RoomcastError> {
        self.send(ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
            user_name: user_name.to_string(),
        })
    }

    /// Send an SDP offer to one peer
    pub fn send_offer(&self, target_id: &str, sdp: &str) -> Result<(), RoomcastError> {
        self.send(ClientMessage::SendOffer {
            target_id: target_id.to_string(),
            sdp: sdp.to_string(),
        })
    }

    /// Send an SDP answer to one peer
    pub fn send_answer(&self, target_id: &str, sdp: &str) -> Result<(), RoomcastError> {
        self.send(ClientMessage::SendAnswer {
            target_id: target_id.to_string(),
            sdp: sdp.to_string(),
        })
    }

    /// Send an ICE candidate to one peer
    pub fn send_ice_candidate(
        &self,
        target_id: &str,
        candidate: serde_json::Value,
    ) -> Result<(), RoomcastError> {
        self.send(ClientMessage::SendIceCandidate {
            target_id: target_id.to_string(),
            candidate,
        })
    }

    /// Send an encoded video frame to one peer
    pub fn send_video_frame(
        &self,
        target_id: &str,
        frame: VideoFrameMessage,
    ) -> Result<(), RoomcastError> {
        self.send(ClientMessage::SendVideoFrame {
            target_id: target_id.to_string(),
            frame,
        })
    }

    /// Broadcast a chat line to the joined room
    pub fn send_chat_message(&self, message: &str) -> Result<(), RoomcastError> {
        self.send(ClientMessage::SendChatMessage {
            message: message.to_string(),
        })
    }

    /// Broadcast the local mute state to the joined room
    pub fn send_media_state(&self, audio: bool, video: bool) -> Result<(), RoomcastError> {
        self.send(ClientMessage::SendMediaState { audio, video })
    }

    /// Close the connection; subsequent sends fail with `NotConnected`
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
        let _ = self.outbound.send(Message::Close(None));
    }

    fn send(&self, message: ClientMessage) -> Result<(), RoomcastError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(RoomcastError::NotConnected);
        }
        let json = serde_json::to_string(&message).map_err(|e| RoomcastError::Transport {
            reason: format!("failed to serialize message: {e}"),
        })?;
        self.outbound
            .send(Message::Text(json))
            .map_err(|_| RoomcastError::NotConnected)
    }
}

fn update_roster(roster: &Mutex<Vec<RoomUser>>, event: &ServerEvent) {
    match event {
        ServerEvent::RoomUsers { users } => *roster.lock() = users.clone(),
        ServerEvent::UserConnected { user } => {
            let mut roster = roster.lock();
            if roster.iter().all(|u| u.id != user.id) {
                roster.push(user.clone());
            }
        }
        ServerEvent::UserDisconnected { user_id } => {
            roster.lock().retain(|u| &u.id != user_id);
        }
        _ => {}
    }
}

/// Lets a [`StreamManager`](roomcast_media::StreamManager) push its encoded
/// frames through this connection's `SendVideoFrame` path
#[async_trait]
impl FrameDelivery for RoomConnection {
    async fn send_frame(
        &self,
        target_id: &str,
        frame: VideoFrameMessage,
    ) -> Result<(), RoomcastError> {
        self.send_video_frame(target_id, frame)
    }
}
