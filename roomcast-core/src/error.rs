//! Error types for roomcast

use std::time::Duration;
use thiserror::Error;

/// Main error type for roomcast operations
#[derive(Error, Debug)]
pub enum RoomcastError {
    /// Operation attempted without an active transport
    #[error("Not connected to the signaling server")]
    NotConnected,

    /// Room-scoped operation from a connection that has not joined a room
    #[error("Connection has not joined a room")]
    NotInRoom,

    /// Relay addressed to a connection id the registry does not know
    #[error("Target connection not found: {target_id}")]
    TargetNotFound {
        /// Connection id the message was addressed to
        target_id: String,
    },

    /// Capture device failed to open; callers degrade to signaling-only
    #[error("Capture device unavailable: {reason}")]
    DeviceUnavailable {
        /// Reason the device could not be opened
        reason: String,
    },

    /// A second outbound stream was started for a target that already has one
    #[error("Stream already active for target {target_id}")]
    StreamAlreadyActive {
        /// Target connection id of the existing stream
        target_id: String,
    },

    /// Frame delivery did not complete within the send deadline
    #[error("Frame delivery to {target_id} timed out after {deadline:?}")]
    DeliveryTimeout {
        /// Target connection id
        target_id: String,
        /// Deadline that elapsed
        deadline: Duration,
    },

    /// Capture read hiccup; the capture loop retries in place
    #[error("Transient capture read failure: {reason}")]
    TransientReadFailure {
        /// Read failure reason
        reason: String,
    },

    /// Frame encoding failed
    #[error("Encoding failed: {reason}")]
    EncodingFailed {
        /// Failure reason
        reason: String,
    },

    /// Inbound message could not be parsed
    #[error("Invalid message: {reason}")]
    InvalidMessage {
        /// Parse failure description
        reason: String,
    },

    /// Transport-level send or receive failure
    #[error("Transport error: {reason}")]
    Transport {
        /// Reason for transport error
        reason: String,
    },

    /// Server failed to bind its listen address
    #[error("Failed to start server on {address}: {reason}")]
    ServerStartFailed {
        /// Address the server tried to bind
        address: std::net::SocketAddr,
        /// Bind failure reason
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl RoomcastError {
    /// Stable error code for programmatic handling across the wire
    pub fn error_code(&self) -> &'static str {
        match self {
            RoomcastError::NotConnected => "NOT_CONNECTED",
            RoomcastError::NotInRoom => "NOT_IN_ROOM",
            RoomcastError::TargetNotFound { .. } => "TARGET_NOT_FOUND",
            RoomcastError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            RoomcastError::StreamAlreadyActive { .. } => "STREAM_ALREADY_ACTIVE",
            RoomcastError::DeliveryTimeout { .. } => "DELIVERY_TIMEOUT",
            RoomcastError::TransientReadFailure { .. } => "TRANSIENT_READ_FAILURE",
            RoomcastError::EncodingFailed { .. } => "ENCODING_FAILED",
            RoomcastError::InvalidMessage { .. } => "INVALID_MESSAGE",
            RoomcastError::Transport { .. } => "TRANSPORT_ERROR",
            RoomcastError::ServerStartFailed { .. } => "SERVER_START_FAILED",
            RoomcastError::Io { .. } => "IO_ERROR",
        }
    }
}
