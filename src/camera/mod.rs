//! Camera capture module
//!
//! Cross-platform capture using the nokhwa crate. Each open stream runs a
//! background capture thread that reports its open/failed outcome over a
//! channel and then publishes frames into a triple-buffered latest-frame
//! slot for the render thread.

pub mod session;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::{Camera, NokhwaError};
use parking_lot::Mutex;
use thiserror::Error;

/// User-facing acquisition failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera access was denied. Allow camera access in your system settings.")]
    PermissionDenied,
    #[error("No camera device was found.")]
    DeviceNotFound,
    #[error("Camera error: {0}")]
    Unknown(String),
}

/// Map a nokhwa error onto the user-facing taxonomy.
///
/// nokhwa folds platform failures into stringly-typed variants, so the
/// classification keys off the message text.
fn classify_error(err: &NokhwaError) -> CameraError {
    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CameraError::PermissionDenied
    } else if lower.contains("not found") || lower.contains("no device") {
        CameraError::DeviceNotFound
    } else {
        CameraError::Unknown(message)
    }
}

/// An available video input device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoDevice {
    /// Stable id within one enumeration (nokhwa index rendered as decimal)
    pub id: String,
    /// Human-readable name
    pub label: String,
}

/// List available video input devices in enumeration order.
///
/// Enumeration failures are logged and produce an empty list; they are
/// never surfaced as a blocking error.
pub fn list_video_devices() -> Vec<VideoDevice> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(camera_list) => camera_list
            .iter()
            .enumerate()
            .map(|(idx, info)| {
                let label = info.human_name();
                let label = if label.trim().is_empty() {
                    format!("Camera {}", idx)
                } else {
                    label.to_string()
                };
                VideoDevice { id: idx.to_string(), label }
            })
            .collect(),
        Err(e) => {
            log::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Outcome of a stream acquisition, tagged with its request token
#[derive(Debug, Clone)]
pub enum CameraEvent {
    Opened {
        token: u64,
        label: String,
        width: u32,
        height: u32,
    },
    Failed {
        token: u64,
        error: CameraError,
    },
}

impl CameraEvent {
    pub fn token(&self) -> u64 {
        match self {
            CameraEvent::Opened { token, .. } | CameraEvent::Failed { token, .. } => *token,
        }
    }
}

/// Camera frame data
#[derive(Clone)]
pub struct CameraFrame {
    /// RGBA pixel data
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic frame number within the stream
    pub frame_number: u64,
}

/// A live capture stream bound to one device
///
/// Owns the capture thread; [`CameraStream::shut_down`] releases the device
/// explicitly and is idempotent (the hardware handle is an exclusive
/// resource, so release must not wait for garbage collection).
pub struct CameraStream {
    /// Latest captured frames, triple buffered
    frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
    /// Index of the latest complete frame
    latest_frame_idx: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
    token: u64,
}

impl CameraStream {
    /// Open a stream for the given device index.
    ///
    /// Returns immediately; the capture thread reports `Opened`/`Failed`
    /// with `token` on `events` once the device responds.
    pub fn open(index: CameraIndex, token: u64, events: Sender<CameraEvent>) -> Self {
        let frames: [Arc<Mutex<Option<CameraFrame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let latest_frame_idx = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let frames_clone = frames.clone();
        let latest_frame_idx_clone = latest_frame_idx.clone();
        let running_clone = running.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    index,
                    token,
                    events,
                    frames_clone,
                    latest_frame_idx_clone,
                    running_clone,
                );
            })
            .ok();

        if thread_handle.is_none() {
            log::error!("Failed to spawn capture thread");
        }

        Self {
            frames,
            latest_frame_idx,
            running,
            thread_handle,
            token,
        }
    }

    /// Token of the acquisition request this stream answers
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Camera capture thread: open the device, report the outcome, then
    /// publish frames until shut down.
    fn capture_thread(
        index: CameraIndex,
        token: u64,
        events: Sender<CameraEvent>,
        frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
        latest_frame_idx: Arc<AtomicU64>,
        running: Arc<AtomicBool>,
    ) {
        log::info!("Starting camera capture thread ({:?})", index);

        let mut camera = match Self::open_camera(index) {
            Ok(c) => c,
            Err(e) => {
                let _ = events.send(CameraEvent::Failed { token, error: classify_error(&e) });
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            log::error!("Failed to open camera stream: {:?}", e);
            let _ = events.send(CameraEvent::Failed { token, error: classify_error(&e) });
            return;
        }

        let label = camera.info().human_name().to_string();
        let resolution = camera.resolution();
        log::info!(
            "Camera opened: {} ({}x{})",
            label,
            resolution.width(),
            resolution.height()
        );
        let _ = events.send(CameraEvent::Opened {
            token,
            label,
            width: resolution.width(),
            height: resolution.height(),
        });

        let mut write_idx: u64 = 0;
        let mut frame_count: u64 = 0;

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        frame_count += 1;

                        let camera_frame = CameraFrame {
                            data: image.into_raw(),
                            width: frame.resolution().width(),
                            height: frame.resolution().height(),
                            frame_number: frame_count,
                        };

                        let slot = (write_idx % 3) as usize;
                        *frames[slot].lock() = Some(camera_frame);

                        latest_frame_idx.store(write_idx, Ordering::Release);
                        write_idx = write_idx.wrapping_add(1);
                    }
                    Err(e) => {
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }

        log::info!("Camera capture thread stopped");
    }

    /// Open a camera, stepping down through format requests until one works
    fn open_camera(index: CameraIndex) -> Result<Camera, NokhwaError> {
        let requested =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);
        match Camera::new(index.clone(), requested) {
            Ok(c) => return Ok(c),
            Err(e) => log::warn!("Failed to open camera with highest resolution: {:?}", e),
        }

        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(640, 480),
        ));
        match Camera::new(index.clone(), requested) {
            Ok(c) => return Ok(c),
            Err(e) => log::warn!("Failed with HighestResolution: {:?}", e),
        }

        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None);
        Camera::new(index, requested)
    }

    /// Get the latest captured frame
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        self.frames[slot].lock().clone()
    }

    /// Stop capturing and release the device. Safe to call more than once;
    /// only the first call joins the capture thread.
    pub fn shut_down(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Signal the capture thread to stop without waiting for it. Used when
    /// a newer acquisition supersedes this stream: the thread may still be
    /// inside a device open that takes seconds, and joining there would
    /// stall the caller. The thread exits on its own; any event it still
    /// sends carries a stale token and is discarded.
    pub fn detach(mut self) {
        self.running.store(false, Ordering::Release);
        self.thread_handle.take();
    }

    /// Whether the capture thread has been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Build a stream whose thread stays busy for `busy_for` regardless of
    /// the stop flag, like a device open that has not returned yet
    #[cfg(test)]
    pub(crate) fn stub_busy(token: u64, busy_for: std::time::Duration) -> Self {
        let frames: [Arc<Mutex<Option<CameraFrame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let thread_handle = std::thread::spawn(move || {
            std::thread::sleep(busy_for);
            running_clone.store(false, Ordering::Release);
        });
        Self {
            frames,
            latest_frame_idx: Arc::new(AtomicU64::new(0)),
            running,
            thread_handle: Some(thread_handle),
            token,
        }
    }

    /// Build a stream with a stub thread instead of real hardware
    #[cfg(test)]
    pub(crate) fn stub(token: u64) -> Self {
        let frames: [Arc<Mutex<Option<CameraFrame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let thread_handle = std::thread::spawn(move || {
            while running_clone.load(Ordering::Acquire) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });
        Self {
            frames,
            latest_frame_idx: Arc::new(AtomicU64::new(0)),
            running,
            thread_handle: Some(thread_handle),
            token,
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shut_down();
    }
}
