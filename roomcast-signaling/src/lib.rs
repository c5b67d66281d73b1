//! # roomcast signaling
//!
//! Room membership tracking and message routing for roomcast.
//! The [`registry`] is the single source of truth for who is in which room,
//! the [`broker`] routes join snapshots, targeted relays, and room broadcasts,
//! and the [`server`] exposes the broker over WebSockets.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod broker;
pub mod registry;
pub mod server;

// Re-export main types
pub use broker::{EventSink, RelayPayload, SignalingBroker};
pub use registry::RoomRegistry;
pub use server::{Outbox, ServerConfig, SignalingServer};
