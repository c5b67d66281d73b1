//! Wire protocol for the signaling broker
//!
//! All traffic is JSON text frames carrying one of two tagged enums:
//! [`ClientMessage`] for caller intents and [`ServerEvent`] for everything the
//! broker delivers back. Connection ids are opaque strings assigned by the
//! server at accept time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque connection identifier assigned by the server
pub type ConnectionId = String;

/// Participant record as seen by other room members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    /// Connection id, unique for the lifetime of the connection
    pub id: ConnectionId,
    /// Display name chosen at join time
    pub user_name: String,
    /// Room this connection belongs to
    pub room_id: String,
}

/// One encoded video frame addressed to a single peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFrameMessage {
    /// Capture timestamp, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Per-session frame counter, starting at 0
    pub frame_index: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// JPEG-encoded pixel data
    pub encoded_data: Vec<u8>,
    /// Encoder quality in [1, 100]
    pub quality_level: u8,
    /// Size of `encoded_data` in bytes
    pub byte_size: usize,
}

/// Messages a connected client sends to the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room; the broker replies with the current roster and announces
    /// the caller to everyone else
    JoinRoom {
        /// Room to join, created lazily on first join
        room_id: String,
        /// Display name for the roster
        user_name: String,
    },
    /// Relay an SDP offer to one peer
    SendOffer {
        /// Target connection id
        target_id: ConnectionId,
        /// Session description
        sdp: String,
    },
    /// Relay an SDP answer to one peer
    SendAnswer {
        /// Target connection id
        target_id: ConnectionId,
        /// Session description
        sdp: String,
    },
    /// Relay an ICE candidate to one peer
    SendIceCandidate {
        /// Target connection id
        target_id: ConnectionId,
        /// Candidate payload, passed through opaquely
        candidate: serde_json::Value,
    },
    /// Relay an encoded video frame to one peer
    SendVideoFrame {
        /// Target connection id
        target_id: ConnectionId,
        /// The frame
        frame: VideoFrameMessage,
    },
    /// Broadcast a chat line to the caller's room
    SendChatMessage {
        /// Message body
        message: String,
    },
    /// Broadcast the caller's mute state to the room
    SendMediaState {
        /// Whether audio is enabled
        audio: bool,
        /// Whether video is enabled
        video: bool,
    },
}

/// Events the broker delivers to a connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Roster snapshot, sent exactly once to a new joiner before any other
    /// room traffic; never contains the joiner itself
    RoomUsers {
        /// Pre-existing members in join order
        users: Vec<RoomUser>,
    },
    /// A new participant joined the room
    UserConnected {
        /// The participant that joined
        user: RoomUser,
    },
    /// A participant left the room; carries only the departed id
    UserDisconnected {
        /// Connection id that left
        user_id: ConnectionId,
    },
    /// SDP offer relayed from another participant
    Offer {
        /// Session description
        sdp: String,
        /// Connection id of the offerer
        sender: ConnectionId,
    },
    /// SDP answer relayed from another participant
    Answer {
        /// Session description
        sdp: String,
        /// Connection id of the answerer
        sender: ConnectionId,
    },
    /// ICE candidate relayed from another participant
    IceCandidate {
        /// Candidate payload, passed through opaquely
        candidate: serde_json::Value,
        /// Connection id of the sender
        sender: ConnectionId,
    },
    /// Encoded video frame relayed from another participant
    VideoFrame {
        /// The frame
        frame: VideoFrameMessage,
        /// Connection id of the sender
        sender: ConnectionId,
    },
    /// Chat line broadcast to the room
    ChatMessage {
        /// Display name of the sender
        user_name: String,
        /// Message body
        message: String,
        /// Server-side receive time
        time: DateTime<Utc>,
    },
    /// Mute-state change broadcast to the room
    MediaState {
        /// Connection id whose state changed
        user_id: ConnectionId,
        /// Whether audio is enabled
        audio: bool,
        /// Whether video is enabled
        video: bool,
    },
    /// Structured failure reported back to the caller
    Error {
        /// Human-readable description
        error: String,
        /// Stable code, see [`RoomcastError::error_code`](crate::RoomcastError::error_code)
        error_code: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_serialization() {
        let message = ClientMessage::JoinRoom {
            room_id: "demo".to_string(),
            user_name: "alice".to_string(),
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("join_room"));
        assert!(json.contains("demo"));

        let deserialized: ClientMessage = serde_json::from_str(&json).unwrap();
        match deserialized {
            ClientMessage::JoinRoom { room_id, user_name } => {
                assert_eq!(room_id, "demo");
                assert_eq!(user_name, "alice");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_offer_round_trip() {
        let event = ServerEvent::Offer {
            sdp: "v=0...".to_string(),
            sender: "conn-1".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("offer"));
        assert!(json.contains("conn-1"));

        let deserialized: ServerEvent = serde_json::from_str(&json).unwrap();
        match deserialized {
            ServerEvent::Offer { sdp, sender } => {
                assert_eq!(sdp, "v=0...");
                assert_eq!(sender, "conn-1");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_ice_candidate_payload_is_opaque() {
        let candidate = serde_json::json!({
            "candidate": "candidate:0 1 UDP 2122252543 192.0.2.1 54321 typ host",
            "sdpMLineIndex": 0,
        });
        let message = ClientMessage::SendIceCandidate {
            target_id: "conn-2".to_string(),
            candidate: candidate.clone(),
        };

        let json = serde_json::to_string(&message).unwrap();
        let deserialized: ClientMessage = serde_json::from_str(&json).unwrap();
        match deserialized {
            ClientMessage::SendIceCandidate {
                candidate: parsed, ..
            } => assert_eq!(parsed, candidate),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_video_frame_message_round_trip() {
        let frame = VideoFrameMessage {
            timestamp: 1_700_000_000_000,
            frame_index: 42,
            width: 640,
            height: 480,
            encoded_data: vec![0xff, 0xd8, 0xff, 0xd9],
            quality_level: 80,
            byte_size: 4,
        };

        let json = serde_json::to_string(&frame).unwrap();
        let deserialized: VideoFrameMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, frame);
    }

    #[test]
    fn test_client_message_variants() {
        let messages = vec![
            ClientMessage::SendOffer {
                target_id: "t".to_string(),
                sdp: "v=0".to_string(),
            },
            ClientMessage::SendAnswer {
                target_id: "t".to_string(),
                sdp: "v=0".to_string(),
            },
            ClientMessage::SendChatMessage {
                message: "hi".to_string(),
            },
            ClientMessage::SendMediaState {
                audio: true,
                video: false,
            },
        ];

        for message in messages {
            let json = serde_json::to_string(&message).unwrap();
            let _deserialized: ClientMessage = serde_json::from_str(&json).unwrap();
        }
    }
}
