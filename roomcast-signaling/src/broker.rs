//! Signaling broker
//!
//! Routes everything a connection may send once it is in a room: the join
//! handshake (roster snapshot first, then the announce), targeted relays for
//! offer/answer/ICE/video-frame, and room broadcasts for chat, media state,
//! and disconnect notices. Delivery goes through the [`EventSink`] trait so
//! the broker is independent of the transport that carries the events.

use crate::registry::RoomRegistry;
use async_trait::async_trait;
use chrono::Utc;
use roomcast_core::protocol::{ClientMessage, ServerEvent, VideoFrameMessage};
use roomcast_core::RoomcastError;
use tracing::{debug, info, warn};

/// Directed delivery primitive supplied by the transport layer
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event to one connection
    async fn deliver(&self, connection_id: &str, event: ServerEvent) -> Result<(), RoomcastError>;
}

/// Payload of a targeted relay
#[derive(Debug, Clone)]
pub enum RelayPayload {
    /// SDP offer
    Offer {
        /// Session description
        sdp: String,
    },
    /// SDP answer
    Answer {
        /// Session description
        sdp: String,
    },
    /// ICE candidate, passed through opaquely
    IceCandidate {
        /// Candidate payload
        candidate: serde_json::Value,
    },
    /// Encoded video frame
    VideoFrame {
        /// The frame
        frame: VideoFrameMessage,
    },
}

impl RelayPayload {
    fn into_event(self, sender: &str) -> ServerEvent {
        let sender = sender.to_string();
        match self {
            RelayPayload::Offer { sdp } => ServerEvent::Offer { sdp, sender },
            RelayPayload::Answer { sdp } => ServerEvent::Answer { sdp, sender },
            RelayPayload::IceCandidate { candidate } => {
                ServerEvent::IceCandidate { candidate, sender }
            }
            RelayPayload::VideoFrame { frame } => ServerEvent::VideoFrame { frame, sender },
        }
    }
}

/// Room-aware message router
///
/// Signaling operations other than the join itself require the sender to be
/// registered; they fail with [`RoomcastError::NotInRoom`] otherwise.
#[derive(Debug)]
pub struct SignalingBroker<S> {
    registry: RoomRegistry,
    sink: S,
}

impl<S: EventSink> SignalingBroker<S> {
    /// Create a broker delivering through the given sink
    pub fn new(sink: S) -> Self {
        Self {
            registry: RoomRegistry::new(),
            sink,
        }
    }

    /// Membership registry backing this broker
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Dispatch one inbound client message
    pub async fn handle_message(
        &self,
        connection_id: &str,
        message: ClientMessage,
    ) -> Result<(), RoomcastError> {
        match message {
            ClientMessage::JoinRoom { room_id, user_name } => {
                self.handle_join(connection_id, &room_id, &user_name).await
            }
            ClientMessage::SendOffer { target_id, sdp } => {
                self.relay(connection_id, &target_id, RelayPayload::Offer { sdp })
                    .await
            }
            ClientMessage::SendAnswer { target_id, sdp } => {
                self.relay(connection_id, &target_id, RelayPayload::Answer { sdp })
                    .await
            }
            ClientMessage::SendIceCandidate {
                target_id,
                candidate,
            } => {
                self.relay(
                    connection_id,
                    &target_id,
                    RelayPayload::IceCandidate { candidate },
                )
                .await
            }
            ClientMessage::SendVideoFrame { target_id, frame } => {
                self.relay(connection_id, &target_id, RelayPayload::VideoFrame { frame })
                    .await
            }
            ClientMessage::SendChatMessage { message } => {
                self.handle_chat(connection_id, message).await
            }
            ClientMessage::SendMediaState { audio, video } => {
                self.handle_media_state(connection_id, audio, video).await
            }
        }
    }

    /// Register the caller in a room, send it the current roster, and announce
    /// it to everyone else
    ///
    /// The roster snapshot is taken before the announce goes out, so the new
    /// joiner's first message is always the pre-existing membership and never
    /// includes itself.
    pub async fn handle_join(
        &self,
        connection_id: &str,
        room_id: &str,
        user_name: &str,
    ) -> Result<(), RoomcastError> {
        let user = self.registry.join(connection_id, room_id, user_name);

        // Snapshot before announcing; ordering is load-bearing
        let roster = self.registry.other_members(room_id, connection_id);

        self.sink
            .deliver(connection_id, ServerEvent::RoomUsers { users: roster })
            .await?;

        self.broadcast_to_room(
            room_id,
            connection_id,
            ServerEvent::UserConnected { user: user.clone() },
        )
        .await;

        info!("{} joined room {}", user.user_name, room_id);
        Ok(())
    }

    /// Forward a payload to exactly one live connection
    ///
    /// An unknown target is reported to the caller as `TargetNotFound` and
    /// produces no delivery attempt.
    pub async fn relay(
        &self,
        sender_id: &str,
        target_id: &str,
        payload: RelayPayload,
    ) -> Result<(), RoomcastError> {
        if !self.registry.contains(sender_id) {
            return Err(RoomcastError::NotInRoom);
        }
        if !self.registry.contains(target_id) {
            return Err(RoomcastError::TargetNotFound {
                target_id: target_id.to_string(),
            });
        }

        debug!("relay from {} to {}", sender_id, target_id);
        self.sink
            .deliver(target_id, payload.into_event(sender_id))
            .await
    }

    /// Broadcast a chat line to the caller's room
    pub async fn handle_chat(
        &self,
        connection_id: &str,
        message: String,
    ) -> Result<(), RoomcastError> {
        let user = self
            .registry
            .get(connection_id)
            .ok_or(RoomcastError::NotInRoom)?;

        self.broadcast_to_room(
            &user.room_id,
            connection_id,
            ServerEvent::ChatMessage {
                user_name: user.user_name,
                message,
                time: Utc::now(),
            },
        )
        .await;
        Ok(())
    }

    /// Broadcast the caller's mute state to its room
    pub async fn handle_media_state(
        &self,
        connection_id: &str,
        audio: bool,
        video: bool,
    ) -> Result<(), RoomcastError> {
        let user = self
            .registry
            .get(connection_id)
            .ok_or(RoomcastError::NotInRoom)?;

        self.broadcast_to_room(
            &user.room_id,
            connection_id,
            ServerEvent::MediaState {
                user_id: user.id,
                audio,
                video,
            },
        )
        .await;
        Ok(())
    }

    /// Remove a departed connection and notify its room
    ///
    /// Safe to call multiple times: only the call that actually removes the
    /// registration broadcasts, so a disconnect racing an explicit leave
    /// produces exactly one `UserDisconnected` per remaining member. Never
    /// fails, even for connections that never joined.
    pub async fn handle_disconnect(&self, connection_id: &str) {
        let Some(user) = self.registry.leave(connection_id) else {
            return;
        };

        self.broadcast_to_room(
            &user.room_id,
            connection_id,
            ServerEvent::UserDisconnected {
                user_id: user.id.clone(),
            },
        )
        .await;

        info!("{} left room {}", user.user_name, user.room_id);
    }

    /// Deliver an event to every room member except the originator
    ///
    /// A failed delivery to one recipient is logged and does not stop
    /// deliveries to the rest.
    pub async fn broadcast_to_room(&self, room_id: &str, exclude: &str, event: ServerEvent) {
        for member in self.registry.other_members(room_id, exclude) {
            if let Err(e) = self.sink.deliver(&member.id, event.clone()).await {
                warn!("broadcast to {} in room {} failed: {}", member.id, room_id, e);
            }
        }
    }
}
