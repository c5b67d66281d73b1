//! # roomcast media
//!
//! The producer/consumer video pipeline: camera capture into a bounded
//! drop-oldest frame ring, JPEG encoding, and per-target streamer workers
//! that deliver quality-tagged frame messages under a send deadline.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod encode;
pub mod frame;
pub mod source;
pub mod streamer;

// Re-export main types
pub use encode::{clamp_quality, encode_jpeg};
pub use frame::{FrameBuffer, RawFrame};
pub use source::{CameraSource, CaptureBackend, CaptureConfig, CaptureEvent};
pub use streamer::{FrameDelivery, FrameSource, StreamConfig, StreamManager};
