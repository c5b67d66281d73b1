//! # roomcast core
//!
//! Shared wire protocol and error taxonomy for the roomcast system.
//! The signaling crate, media pipeline, and client facade all speak the
//! [`protocol`] types and report failures as [`RoomcastError`].

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod protocol;

// Re-export main types
pub use error::RoomcastError;
pub use protocol::{ClientMessage, ConnectionId, RoomUser, ServerEvent, VideoFrameMessage};
