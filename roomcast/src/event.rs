//! Typed event stream for room sessions

use roomcast_core::protocol::{RoomUser, ServerEvent, VideoFrameMessage};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Events observed by a connected room participant
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Roster of users already present, delivered once after joining
    RoomUsers {
        /// Current room members in join order
        users: Vec<RoomUser>,
    },
    /// Another user joined the room
    UserConnected {
        /// The user that joined
        user: RoomUser,
    },
    /// A user left the room
    UserDisconnected {
        /// Connection id of the departed user
        user_id: String,
    },
    /// An SDP offer addressed to this connection
    Offer {
        /// Session description
        sdp: String,
        /// Connection id of the offerer
        sender: String,
    },
    /// An SDP answer addressed to this connection
    Answer {
        /// Session description
        sdp: String,
        /// Connection id of the answerer
        sender: String,
    },
    /// An ICE candidate addressed to this connection
    IceCandidate {
        /// Opaque candidate payload
        candidate: serde_json::Value,
        /// Connection id of the peer
        sender: String,
    },
    /// An encoded video frame addressed to this connection
    VideoFrame {
        /// The frame payload
        frame: VideoFrameMessage,
        /// Connection id of the producer
        sender: String,
    },
    /// A chat line broadcast to the room
    ChatMessage {
        /// Display name of the author
        user_name: String,
        /// Message body
        message: String,
        /// Server-side timestamp
        time: DateTime<Utc>,
    },
    /// A peer's mute state changed
    MediaState {
        /// Connection id of the peer
        user_id: String,
        /// Whether audio is enabled
        audio: bool,
        /// Whether video is enabled
        video: bool,
    },
    /// The server rejected a request
    ServerError {
        /// Human-readable description
        error: String,
        /// Stable machine-readable code
        error_code: String,
    },
    /// The underlying transport closed
    Disconnected,
}

impl RoomEvent {
    /// Event type as a string, for logging and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::RoomUsers { .. } => "room_users",
            RoomEvent::UserConnected { .. } => "user_connected",
            RoomEvent::UserDisconnected { .. } => "user_disconnected",
            RoomEvent::Offer { .. } => "offer",
            RoomEvent::Answer { .. } => "answer",
            RoomEvent::IceCandidate { .. } => "ice_candidate",
            RoomEvent::VideoFrame { .. } => "video_frame",
            RoomEvent::ChatMessage { .. } => "chat_message",
            RoomEvent::MediaState { .. } => "media_state",
            RoomEvent::ServerError { .. } => "server_error",
            RoomEvent::Disconnected => "disconnected",
        }
    }

    /// Whether this event concerns room membership
    pub fn is_membership_event(&self) -> bool {
        matches!(
            self,
            RoomEvent::RoomUsers { .. }
                | RoomEvent::UserConnected { .. }
                | RoomEvent::UserDisconnected { .. }
        )
    }

    /// Whether this event is part of a session negotiation exchange
    pub fn is_signaling_event(&self) -> bool {
        matches!(
            self,
            RoomEvent::Offer { .. } | RoomEvent::Answer { .. } | RoomEvent::IceCandidate { .. }
        )
    }
}

impl From<ServerEvent> for RoomEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::RoomUsers { users } => RoomEvent::RoomUsers { users },
            ServerEvent::UserConnected { user } => RoomEvent::UserConnected { user },
            ServerEvent::UserDisconnected { user_id } => RoomEvent::UserDisconnected { user_id },
            ServerEvent::Offer { sdp, sender } => RoomEvent::Offer { sdp, sender },
            ServerEvent::Answer { sdp, sender } => RoomEvent::Answer { sdp, sender },
            ServerEvent::IceCandidate { candidate, sender } => {
                RoomEvent::IceCandidate { candidate, sender }
            }
            ServerEvent::VideoFrame { frame, sender } => RoomEvent::VideoFrame { frame, sender },
            ServerEvent::ChatMessage {
                user_name,
                message,
                time,
            } => RoomEvent::ChatMessage {
                user_name,
                message,
                time,
            },
            ServerEvent::MediaState {
                user_id,
                audio,
                video,
            } => RoomEvent::MediaState {
                user_id,
                audio,
                video,
            },
            ServerEvent::Error { error, error_code } => RoomEvent::ServerError { error, error_code },
        }
    }
}

/// Stream of room events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<RoomEvent>,
}

impl EventStream {
    /// Wrap a receiver of room events
    pub fn new(receiver: mpsc::UnboundedReceiver<RoomEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` once the connection has shut down
    pub async fn next(&mut self) -> Option<RoomEvent> {
        self.receiver.recv().await
    }

    /// Next event without blocking
    pub fn try_next(&mut self) -> Option<RoomEvent> {
        self.receiver.try_recv().ok()
    }
}
