//! Streamer worker and stream manager tests
//!
//! Drives the per-target workers through synthetic frame sources and
//! delivery sinks: deadline handling, frame-index policy, duplicate-start
//! rejection, and stop semantics.

use async_trait::async_trait;
use parking_lot::Mutex;
use roomcast_core::protocol::VideoFrameMessage;
use roomcast_core::RoomcastError;
use roomcast_media::frame::{now_millis, RawFrame};
use roomcast_media::{FrameDelivery, FrameSource, StreamConfig, StreamManager};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Always has a fresh synthetic 8x8 frame available
struct EndlessSource {
    pulls: AtomicU64,
}

impl EndlessSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            pulls: AtomicU64::new(0),
        })
    }
}

impl FrameSource for EndlessSource {
    fn pull_latest(&self) -> Option<RawFrame> {
        let n = self.pulls.fetch_add(1, Ordering::AcqRel);
        Some(RawFrame {
            width: 8,
            height: 8,
            data: vec![(n % 256) as u8; 8 * 8 * 3],
            timestamp_ms: now_millis(),
        })
    }
}

/// Source that never has a frame
struct EmptySource;

impl FrameSource for EmptySource {
    fn pull_latest(&self) -> Option<RawFrame> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DeliveryMode {
    Accept,
    FailEveryOther,
    Hang,
}

/// Records accepted frames; can fail or stall on demand
struct TestDelivery {
    mode: DeliveryMode,
    attempts: AtomicU64,
    accepted: Mutex<Vec<(String, VideoFrameMessage, Instant)>>,
}

impl TestDelivery {
    fn new(mode: DeliveryMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            attempts: AtomicU64::new(0),
            accepted: Mutex::new(Vec::new()),
        })
    }

    fn accepted_count(&self) -> usize {
        self.accepted.lock().len()
    }
}

#[async_trait]
impl FrameDelivery for TestDelivery {
    async fn send_frame(
        &self,
        target_id: &str,
        frame: VideoFrameMessage,
    ) -> Result<(), RoomcastError> {
        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel);
        match self.mode {
            DeliveryMode::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
            DeliveryMode::FailEveryOther if attempt % 2 == 1 => Err(RoomcastError::Transport {
                reason: "injected delivery failure".to_string(),
            }),
            _ => {
                self.accepted
                    .lock()
                    .push((target_id.to_string(), frame, Instant::now()));
                Ok(())
            }
        }
    }
}

fn fast_config() -> StreamConfig {
    StreamConfig {
        quality: 80,
        frame_interval: Duration::from_millis(1),
        delivery_deadline: Duration::from_millis(50),
        stats_interval: Duration::from_secs(5),
    }
}

async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[tokio::test]
async fn test_frames_flow_to_target() {
    let delivery = TestDelivery::new(DeliveryMode::Accept);
    let manager = StreamManager::new(EndlessSource::new(), delivery.clone());

    manager.start_stream("peer-1", fast_config()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || delivery.accepted_count() >= 3).await);

    let accepted = delivery.accepted.lock();
    for (target, frame, _) in accepted.iter() {
        assert_eq!(target, "peer-1");
        assert_eq!((frame.width, frame.height), (8, 8));
        assert_eq!(frame.quality_level, 80);
        assert_eq!(frame.byte_size, frame.encoded_data.len());
        // JPEG SOI marker
        assert_eq!(&frame.encoded_data[..2], &[0xff, 0xd8]);
    }
    drop(accepted);

    manager.stop_stream("peer-1").await;
}

#[tokio::test]
async fn test_fixed_pacing_between_sends() {
    let delivery = TestDelivery::new(DeliveryMode::Accept);
    let manager = StreamManager::new(EndlessSource::new(), delivery.clone());
    let interval = Duration::from_millis(20);
    let config = StreamConfig {
        frame_interval: interval,
        ..fast_config()
    };

    manager.start_stream("peer-1", config).unwrap();
    assert!(wait_until(Duration::from_secs(2), || delivery.accepted_count() >= 4).await);
    manager.stop_stream("peer-1").await;

    // No two frames dispatched closer together than the configured interval
    let accepted = delivery.accepted.lock();
    for pair in accepted.windows(2) {
        let spacing = pair[1].2.duration_since(pair[0].2);
        assert!(
            spacing >= interval,
            "frames {:?} apart, interval is {:?}",
            spacing,
            interval
        );
    }
}

#[tokio::test]
async fn test_frame_indices_gapless_across_failures() {
    let delivery = TestDelivery::new(DeliveryMode::FailEveryOther);
    let manager = StreamManager::new(EndlessSource::new(), delivery.clone());

    manager.start_stream("peer-1", fast_config()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || delivery.accepted_count() >= 5).await);
    manager.stop_stream("peer-1").await;

    // Dropped frames never consumed an index: delivered indices are 0,1,2,...
    let accepted = delivery.accepted.lock();
    for (expected, (_, frame, _)) in accepted.iter().enumerate() {
        assert_eq!(frame.frame_index, expected as u64);
    }
}

#[tokio::test]
async fn test_duplicate_start_rejected() {
    let delivery = TestDelivery::new(DeliveryMode::Accept);
    let manager = StreamManager::new(EndlessSource::new(), delivery.clone());

    manager.start_stream("peer-1", fast_config()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        manager.frames_sent("peer-1").unwrap_or(0) >= 2
    })
    .await);

    let counter_before = manager.frames_sent("peer-1").unwrap();
    let result = manager.start_stream("peer-1", fast_config());
    assert!(matches!(
        result,
        Err(RoomcastError::StreamAlreadyActive { target_id }) if target_id == "peer-1"
    ));

    // Original session untouched and still progressing
    assert!(manager.is_active("peer-1"));
    assert!(manager.frames_sent("peer-1").unwrap() >= counter_before);

    manager.stop_stream("peer-1").await;
}

#[tokio::test]
async fn test_stalled_recipient_drops_frames_without_blocking() {
    let delivery = TestDelivery::new(DeliveryMode::Hang);
    let config = StreamConfig {
        delivery_deadline: Duration::from_millis(10),
        ..fast_config()
    };
    let manager = StreamManager::new(EndlessSource::new(), delivery.clone());

    manager.start_stream("peer-1", config).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Every delivery timed out: nothing accepted, no index consumed, but the
    // worker kept producing and the stream is still active
    assert_eq!(delivery.accepted_count(), 0);
    assert_eq!(manager.frames_sent("peer-1"), Some(0));
    assert!(delivery.attempts.load(Ordering::Acquire) >= 2);
    assert!(manager.is_active("peer-1"));

    // And stop still completes promptly
    assert!(manager.stop_stream("peer-1").await);
    assert!(!manager.is_active("peer-1"));
}

#[tokio::test]
async fn test_stop_stream_semantics() {
    let delivery = TestDelivery::new(DeliveryMode::Accept);
    let manager = StreamManager::new(EndlessSource::new(), delivery.clone());

    manager.start_stream("peer-1", fast_config()).unwrap();
    assert!(manager.stop_stream("peer-1").await);
    assert!(!manager.is_active("peer-1"));
    assert!(manager.frames_sent("peer-1").is_none());

    // Racing second stop is a no-op
    assert!(!manager.stop_stream("peer-1").await);
}

#[tokio::test]
async fn test_empty_source_idles_until_stopped() {
    let delivery = TestDelivery::new(DeliveryMode::Accept);
    let manager = StreamManager::new(Arc::new(EmptySource), delivery.clone());

    manager.start_stream("peer-1", fast_config()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(delivery.accepted_count(), 0);
    assert!(manager.is_active("peer-1"));
    assert!(manager.stop_stream("peer-1").await);
}

#[tokio::test]
async fn test_stop_all() {
    let delivery = TestDelivery::new(DeliveryMode::Accept);
    let manager = StreamManager::new(EndlessSource::new(), delivery.clone());

    manager.start_stream("peer-1", fast_config()).unwrap();
    manager.start_stream("peer-2", fast_config()).unwrap();
    assert_eq!(manager.active_targets().len(), 2);

    manager.stop_all().await;
    assert!(manager.active_targets().is_empty());
}

#[tokio::test]
async fn test_with_quality_clamps() {
    assert_eq!(StreamConfig::with_quality(0).quality, 1);
    assert_eq!(StreamConfig::with_quality(150).quality, 100);
    assert_eq!(StreamConfig::with_quality(80).quality, 80);
}
