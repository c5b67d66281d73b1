//! Raw frames and the bounded frame ring
//!
//! The ring trades completeness for freshness: it never holds more than
//! `capacity` frames, and a push into a full ring evicts the oldest entry.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// One uncompressed RGB24 frame as it came off the capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed RGB24 pixel data, `width * height * 3` bytes
    pub data: Vec<u8>,
    /// Capture time, milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

/// Bounded drop-oldest ring of frames
///
/// Single-writer (the capture loop), any number of readers through
/// [`FrameBuffer::pop`]; callers provide the locking.
#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<RawFrame>,
    capacity: usize,
}

impl FrameBuffer {
    /// Default ring depth
    pub const DEFAULT_CAPACITY: usize = 5;

    /// Create a ring holding at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a frame, evicting the oldest entry if the ring is full
    pub fn push(&mut self, frame: RawFrame) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Remove and return the oldest buffered frame
    pub fn pop(&mut self) -> Option<RawFrame> {
        self.frames.pop_front()
    }

    /// Number of frames currently buffered
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the ring is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
