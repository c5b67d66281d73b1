//! Frame source: capture device, worker loop, and the shared frame ring
//!
//! A [`CameraSource`] owns one capture backend and one dedicated blocking
//! worker that reads frames into a bounded drop-oldest ring. Consumers pull
//! through [`CameraSource::pull_latest`]; the worker is the only writer. The
//! ring lock is held only around enqueue/dequeue, never across device I/O.

use crate::frame::{now_millis, FrameBuffer, RawFrame};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use parking_lot::Mutex;
use roomcast_core::RoomcastError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};

/// Backoff between retries after a failed device read
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Bounded wait when joining the capture worker on stop
const STOP_JOIN_WAIT: Duration = Duration::from_secs(5);

/// Capture device configuration
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Device index as enumerated by the platform
    pub device_index: u32,
    /// Requested frame width in pixels
    pub width: u32,
    /// Requested frame height in pixels
    pub height: u32,
    /// Requested frame rate
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Capture lifecycle notifications for observers
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The capture worker started
    CaptureStarted,
    /// The capture worker stopped
    CaptureStopped,
    /// A frame landed in the ring
    FrameCaptured {
        /// Frame width in pixels
        width: u32,
        /// Frame height in pixels
        height: u32,
        /// Ring occupancy after the push
        buffered: usize,
    },
}

/// One blocking read from a capture device
///
/// A read failure is treated as transient: the capture loop backs off briefly
/// and retries without terminating.
pub trait CaptureBackend: Send {
    /// Read the next frame from the device
    fn read_frame(&mut self) -> Result<RawFrame, RoomcastError>;
}

/// Camera backend over nokhwa
pub struct CameraBackend {
    camera: Camera,
}

impl CameraBackend {
    /// Open the device described by `config` and start its stream
    pub fn open(config: &CaptureConfig) -> Result<Self, RoomcastError> {
        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(CameraIndex::Index(config.device_index), requested)
            .map_err(|e| RoomcastError::DeviceUnavailable {
                reason: e.to_string(),
            })?;
        camera
            .open_stream()
            .map_err(|e| RoomcastError::DeviceUnavailable {
                reason: e.to_string(),
            })?;

        debug!(
            "camera {} opened ({}x{} @ {}fps)",
            config.device_index, config.width, config.height, config.fps
        );
        Ok(Self { camera })
    }
}

impl CaptureBackend for CameraBackend {
    fn read_frame(&mut self) -> Result<RawFrame, RoomcastError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| RoomcastError::TransientReadFailure {
                reason: e.to_string(),
            })?;
        let decoded =
            buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| RoomcastError::TransientReadFailure {
                    reason: e.to_string(),
                })?;

        Ok(RawFrame {
            width: decoded.width(),
            height: decoded.height(),
            data: decoded.into_raw(),
            timestamp_ms: now_millis(),
        })
    }
}

/// Capture device plus its worker loop and frame ring
pub struct CameraSource {
    buffer: Arc<Mutex<FrameBuffer>>,
    running: Arc<AtomicBool>,
    /// Shared with the worker, which returns the backend here on exit so the
    /// source can be restarted
    backend: Arc<Mutex<Option<Box<dyn CaptureBackend>>>>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
    events: broadcast::Sender<CaptureEvent>,
    config: CaptureConfig,
}

impl CameraSource {
    /// Open the configured camera
    ///
    /// A `DeviceUnavailable` error here is non-fatal to the system: callers
    /// proceed without video and signaling still functions.
    pub fn open(config: CaptureConfig) -> Result<Self, RoomcastError> {
        let backend = CameraBackend::open(&config)?;
        Ok(Self::with_backend(Box::new(backend), config))
    }

    /// Build a source over an already-open backend
    pub fn with_backend(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            buffer: Arc::new(Mutex::new(FrameBuffer::default())),
            running: Arc::new(AtomicBool::new(false)),
            backend: Arc::new(Mutex::new(Some(backend))),
            worker: Mutex::new(None),
            events,
            config,
        }
    }

    /// Spawn the capture worker; a no-op if it is already running
    pub fn start_capture(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(mut backend) = self.backend.lock().take() else {
            self.running.store(false, Ordering::Release);
            warn!("capture backend still shutting down, cannot start");
            return;
        };

        let buffer = self.buffer.clone();
        let running = self.running.clone();
        let events = self.events.clone();
        let backend_slot = self.backend.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let _ = events.send(CaptureEvent::CaptureStarted);
            let mut captured: u64 = 0;

            while running.load(Ordering::Acquire) {
                let frame = match backend.read_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        trace!("capture read failed, retrying: {}", e);
                        std::thread::sleep(READ_RETRY_BACKOFF);
                        continue;
                    }
                };

                captured += 1;
                let (width, height) = (frame.width, frame.height);
                let buffered = {
                    let mut ring = buffer.lock();
                    ring.push(frame);
                    ring.len()
                };
                let _ = events.send(CaptureEvent::FrameCaptured {
                    width,
                    height,
                    buffered,
                });

                if captured % 30 == 0 {
                    debug!("captured {} frames ({} buffered)", captured, buffered);
                }
            }

            // Hand the backend back so a later start_capture can reuse it
            *backend_slot.lock() = Some(backend);
            let _ = events.send(CaptureEvent::CaptureStopped);
        });

        *self.worker.lock() = Some(handle);
        debug!("camera capture started");
    }

    /// Stop the worker and wait for it to exit, bounded by a 5 s join
    pub async fn stop_capture(&self) {
        self.running.store(false, Ordering::Release);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_JOIN_WAIT, handle).await.is_err() {
                error!("capture worker did not stop within {:?}", STOP_JOIN_WAIT);
            }
        }
        debug!("camera capture stopped");
    }

    /// Whether the capture worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Remove and return the oldest buffered frame, non-blocking
    pub fn pull_latest(&self) -> Option<RawFrame> {
        self.buffer.lock().pop()
    }

    /// Number of frames currently buffered
    pub fn buffered_count(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Subscribe to capture lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// The configuration this source was opened with
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl std::fmt::Debug for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSource")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("buffered", &self.buffered_count())
            .finish()
    }
}
