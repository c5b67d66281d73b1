//! Per-target video streamers
//!
//! One worker per outbound stream: pull the freshest frame from the source,
//! JPEG-compress it, and hand the resulting [`VideoFrameMessage`] to the
//! delivery path under a bounded deadline. A slow or stalled recipient costs
//! dropped frames, never a blocked producer.

use crate::encode::{clamp_quality, encode_jpeg};
use crate::frame::{now_millis, RawFrame};
use crate::source::CameraSource;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use roomcast_core::protocol::VideoFrameMessage;
use roomcast_core::RoomcastError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bounded wait when joining a streamer worker on stop
const STOP_JOIN_WAIT: Duration = Duration::from_secs(5);

/// Non-blocking supplier of raw frames
pub trait FrameSource: Send + Sync {
    /// Remove and return the oldest buffered frame, if any
    fn pull_latest(&self) -> Option<RawFrame>;
}

impl FrameSource for CameraSource {
    fn pull_latest(&self) -> Option<RawFrame> {
        CameraSource::pull_latest(self)
    }
}

/// Targeted frame delivery supplied by the signaling layer
#[async_trait]
pub trait FrameDelivery: Send + Sync {
    /// Deliver one encoded frame to one peer
    async fn send_frame(
        &self,
        target_id: &str,
        frame: VideoFrameMessage,
    ) -> Result<(), RoomcastError>;
}

/// Per-stream tuning
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// JPEG quality in [1, 100]
    pub quality: u8,
    /// Fixed pacing between frames; no two frames are sent closer together
    pub frame_interval: Duration,
    /// Bounded wait on each delivery before the frame is dropped
    pub delivery_deadline: Duration,
    /// Rolling statistics window
    pub stats_interval: Duration,
}

impl StreamConfig {
    /// Default configuration at the given quality, clamped into [1, 100]
    pub fn with_quality(quality: i32) -> Self {
        Self {
            quality: clamp_quality(quality),
            ..Self::default()
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            frame_interval: Duration::from_millis(33),
            delivery_deadline: Duration::from_millis(100),
            stats_interval: Duration::from_secs(5),
        }
    }
}

/// One active outbound stream
#[derive(Debug)]
struct StreamSession {
    active: Arc<AtomicBool>,
    frame_counter: Arc<AtomicU64>,
    worker: tokio::task::JoinHandle<()>,
}

/// Active-streams map with safe start/stop
///
/// At most one outbound stream per target. `stop_stream` may race a
/// stop-on-disconnect; whichever call removes the session joins the worker,
/// the other is a no-op.
pub struct StreamManager<D> {
    source: Arc<dyn FrameSource>,
    delivery: Arc<D>,
    sessions: DashMap<String, StreamSession>,
}

impl<D: FrameDelivery + 'static> StreamManager<D> {
    /// Create a manager streaming from `source` through `delivery`
    pub fn new(source: Arc<dyn FrameSource>, delivery: Arc<D>) -> Self {
        Self {
            source,
            delivery,
            sessions: DashMap::new(),
        }
    }

    /// Start streaming to a target
    ///
    /// Fails with `StreamAlreadyActive` if a stream for this target exists;
    /// the existing session is left untouched.
    pub fn start_stream(&self, target_id: &str, config: StreamConfig) -> Result<(), RoomcastError> {
        match self.sessions.entry(target_id.to_string()) {
            Entry::Occupied(_) => Err(RoomcastError::StreamAlreadyActive {
                target_id: target_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                let active = Arc::new(AtomicBool::new(true));
                let frame_counter = Arc::new(AtomicU64::new(0));

                let worker = tokio::spawn(stream_loop(
                    self.source.clone(),
                    self.delivery.clone(),
                    target_id.to_string(),
                    config,
                    active.clone(),
                    frame_counter.clone(),
                ));

                slot.insert(StreamSession {
                    active,
                    frame_counter,
                    worker,
                });
                info!("video streaming started to {}", target_id);
                Ok(())
            }
        }
    }

    /// Stop the stream to a target and wait for its worker to exit
    ///
    /// Returns `false` if no stream was active for the target. The join is
    /// bounded at 5 s; the worker observes the stop flag within one frame
    /// interval.
    pub async fn stop_stream(&self, target_id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(target_id) else {
            return false;
        };
        session.active.store(false, Ordering::Release);
        if tokio::time::timeout(STOP_JOIN_WAIT, session.worker)
            .await
            .is_err()
        {
            warn!("streamer for {} did not stop within {:?}", target_id, STOP_JOIN_WAIT);
        }
        info!("video streaming stopped to {}", target_id);
        true
    }

    /// Stop every active stream
    pub async fn stop_all(&self) {
        let targets: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for target_id in targets {
            self.stop_stream(&target_id).await;
        }
    }

    /// Whether a stream is active for the target
    pub fn is_active(&self, target_id: &str) -> bool {
        self.sessions.contains_key(target_id)
    }

    /// Frames successfully dispatched to the target so far
    pub fn frames_sent(&self, target_id: &str) -> Option<u64> {
        self.sessions
            .get(target_id)
            .map(|s| s.frame_counter.load(Ordering::Acquire))
    }

    /// Targets with an active stream
    pub fn active_targets(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}

impl<D> std::fmt::Debug for StreamManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("active_sessions", &self.sessions.len())
            .finish()
    }
}

/// The streamer worker loop
///
/// `frame_counter` advances only on successful dispatch, so frame indices
/// seen by the target are gapless even across dropped frames.
async fn stream_loop<D: FrameDelivery>(
    source: Arc<dyn FrameSource>,
    delivery: Arc<D>,
    target_id: String,
    config: StreamConfig,
    active: Arc<AtomicBool>,
    frame_counter: Arc<AtomicU64>,
) {
    let mut window_start = Instant::now();
    let mut window_frames: u64 = 0;
    let mut window_bytes: u64 = 0;

    while active.load(Ordering::Acquire) {
        let Some(frame) = source.pull_latest() else {
            tokio::time::sleep(config.frame_interval).await;
            continue;
        };

        let encoded = match encode_jpeg(&frame, config.quality) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("encode for {} failed: {}", target_id, e);
                tokio::time::sleep(config.frame_interval).await;
                continue;
            }
        };

        let byte_size = encoded.len();
        let message = VideoFrameMessage {
            timestamp: now_millis(),
            frame_index: frame_counter.load(Ordering::Acquire),
            width: frame.width,
            height: frame.height,
            encoded_data: encoded,
            quality_level: config.quality,
            byte_size,
        };

        match tokio::time::timeout(
            config.delivery_deadline,
            delivery.send_frame(&target_id, message),
        )
        .await
        {
            Ok(Ok(())) => {
                frame_counter.fetch_add(1, Ordering::AcqRel);
                window_frames += 1;
                window_bytes += byte_size as u64;
            }
            Ok(Err(e)) => {
                debug!("frame to {} dropped: {}", target_id, e);
            }
            Err(_) => {
                let timeout_err = RoomcastError::DeliveryTimeout {
                    target_id: target_id.clone(),
                    deadline: config.delivery_deadline,
                };
                debug!("frame to {} dropped: {}", target_id, timeout_err);
            }
        }

        if window_start.elapsed() >= config.stats_interval {
            let elapsed = window_start.elapsed().as_secs_f64();
            let fps = window_frames as f64 / elapsed;
            let avg_bytes = if window_frames > 0 {
                window_bytes / window_frames
            } else {
                0
            };
            info!(
                "stream to {}: {:.1} fps, {} bytes/frame avg over {:.1}s",
                target_id, fps, avg_bytes, elapsed
            );
            // Rolling window, not cumulative
            window_frames = 0;
            window_bytes = 0;
            window_start = Instant::now();
        }

        tokio::time::sleep(config.frame_interval).await;
    }
}
