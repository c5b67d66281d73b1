//! # Roomcast - Room-Based Video Signaling and Streaming
//!
//! Roomcast is a small conferencing toolkit: a WebSocket signaling broker
//! that relays session negotiation between room members, plus a capture and
//! encoding pipeline for pushing JPEG video frames through the broker.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::{RoomConnection, RoomEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect to a signaling server and join a room
//!     let (connection, mut events) = RoomConnection::connect("ws://127.0.0.1:3000").await?;
//!     connection.join_room("my-room", "alice")?;
//!
//!     // Handle events
//!     while let Some(event) = events.next().await {
//!         match event {
//!             RoomEvent::UserConnected { user } => {
//!                 connection.send_offer(&user.id, "v=0 ...")?;
//!             }
//!             RoomEvent::Disconnected => break,
//!             other => println!("room event: {}", other.event_type()),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use roomcast_core::{
    ClientMessage, ConnectionId, RoomUser, RoomcastError, ServerEvent, VideoFrameMessage,
};

pub use roomcast_media::{
    CameraSource, CaptureConfig, CaptureEvent, FrameDelivery, FrameSource, StreamConfig,
    StreamManager,
};

pub use roomcast_signaling::{ServerConfig, SignalingServer};

// Public API modules
pub mod config;
pub mod connection;
pub mod event;

// Re-export main API types
pub use config::ClientConfig;
pub use connection::RoomConnection;
pub use event::{EventStream, RoomEvent};

/// Connect to the signaling server named by `config` and join its room
///
/// Convenience wrapper over [`RoomConnection::connect`] followed by
/// [`RoomConnection::join_room`].
pub async fn join(config: &ClientConfig) -> Result<(RoomConnection, EventStream), RoomcastError> {
    let (connection, events) = RoomConnection::connect(&config.server_url).await?;
    connection.join_room(&config.room_id, &config.user_name)?;
    Ok((connection, events))
}
