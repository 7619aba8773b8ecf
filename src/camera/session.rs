//! Camera session
//!
//! Owns the single live capture stream and the acquisition lifecycle. The
//! camera handle is an exclusive resource: applying new settings always
//! releases the previous stream before opening the next one. Acquisition
//! outcomes arrive asynchronously; a monotonically increasing generation
//! token marks which request is authoritative, and completions carrying an
//! older token are discarded so a stale result can never overwrite newer
//! state.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use nokhwa::utils::CameraIndex;

use super::{CameraError, CameraEvent, CameraFrame, CameraStream, VideoDevice};

/// Authoritative acquisition outcome, already filtered for staleness
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Opened { label: String, width: u32, height: u32 },
    Failed(CameraError),
}

/// Lifecycle manager for the one live capture stream
pub struct CameraSession {
    generation: u64,
    stream: Option<CameraStream>,
    events_tx: Sender<CameraEvent>,
    events_rx: Receiver<CameraEvent>,
}

impl Default for CameraSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSession {
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            generation: 0,
            stream: None,
            events_tx,
            events_rx,
        }
    }

    /// Apply camera settings: release the current stream, then (when
    /// enabled) open one for the resolved device.
    ///
    /// A pinned device id not present in `devices` is treated as
    /// not-found and acquisition falls back to the default device.
    pub fn apply(&mut self, enabled: bool, device_id: Option<&str>, devices: &[VideoDevice]) {
        self.release();
        self.generation += 1;

        if !enabled {
            log::info!("Camera disabled");
            return;
        }

        let index = resolve_device(device_id, devices);
        log::info!("Requesting camera stream ({:?}, request {})", index, self.generation);
        self.stream = Some(CameraStream::open(index, self.generation, self.events_tx.clone()));
    }

    /// Drain acquisition outcomes, dropping any that belong to a
    /// superseded request.
    pub fn poll(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    if event.token() != self.generation {
                        log::debug!(
                            "Discarding stale camera event (token {}, current {})",
                            event.token(),
                            self.generation
                        );
                        continue;
                    }
                    updates.push(match event {
                        CameraEvent::Opened { label, width, height, .. } => {
                            SessionUpdate::Opened { label, width, height }
                        }
                        CameraEvent::Failed { error, .. } => SessionUpdate::Failed(error),
                    });
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        updates
    }

    /// Latest frame of the live stream, if any
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        self.stream.as_ref().and_then(|s| s.latest_frame())
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Release the current stream, signalling its capture thread exactly
    /// once. Never waits: the thread can be blocked inside a device open,
    /// and joining it here would stall the event loop. The generation
    /// token makes whatever the detached thread still reports harmless.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::info!("Releasing camera stream (request {})", stream.token());
            stream.detach();
        }
    }

    /// Final shutdown on application exit: release and wait for the
    /// capture thread so the device is closed before the process ends
    pub fn shut_down(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            log::info!("Shutting down camera stream (request {})", stream.token());
            stream.shut_down();
        }
    }

    #[cfg(test)]
    fn events_sender(&self) -> Sender<CameraEvent> {
        self.events_tx.clone()
    }

    #[cfg(test)]
    fn set_stream_for_tests(&mut self, stream: CameraStream) {
        self.stream = Some(stream);
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolve a pinned device id against the enumerated list
fn resolve_device(device_id: Option<&str>, devices: &[VideoDevice]) -> CameraIndex {
    match device_id {
        Some(id) if devices.iter().any(|d| d.id == id) => {
            CameraIndex::Index(id.parse().unwrap_or(0))
        }
        Some(id) => {
            log::warn!("Pinned camera {:?} not in device list, using default", id);
            CameraIndex::Index(0)
        }
        None => CameraIndex::Index(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(ids: &[&str]) -> Vec<VideoDevice> {
        ids.iter()
            .map(|id| VideoDevice { id: id.to_string(), label: format!("Camera {}", id) })
            .collect()
    }

    #[test]
    fn test_resolve_pinned_device() {
        let list = devices(&["0", "1", "2"]);
        assert_eq!(resolve_device(Some("2"), &list), CameraIndex::Index(2));
    }

    #[test]
    fn test_resolve_unknown_device_falls_back_to_default() {
        let list = devices(&["0", "1"]);
        assert_eq!(resolve_device(Some("9"), &list), CameraIndex::Index(0));
        assert_eq!(resolve_device(None, &list), CameraIndex::Index(0));
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut session = CameraSession::new();
        // Two settings changes: the first request is superseded
        session.apply(false, None, &[]);
        let stale_token = 1;
        session.apply(false, None, &[]);

        let tx = session.events_sender();
        tx.send(CameraEvent::Opened {
            token: stale_token,
            label: "old cam".into(),
            width: 640,
            height: 480,
        })
        .unwrap();

        assert!(session.poll().is_empty());
    }

    #[test]
    fn test_current_completion_is_delivered() {
        let mut session = CameraSession::new();
        session.apply(false, None, &[]);

        let tx = session.events_sender();
        tx.send(CameraEvent::Failed { token: 1, error: CameraError::PermissionDenied })
            .unwrap();

        let updates = session.poll();
        assert_eq!(updates, vec![SessionUpdate::Failed(CameraError::PermissionDenied)]);
    }

    #[test]
    fn test_mixed_tokens_keep_only_current() {
        let mut session = CameraSession::new();
        session.apply(false, None, &[]);
        session.apply(false, None, &[]);
        session.apply(false, None, &[]); // current generation: 3

        let tx = session.events_sender();
        tx.send(CameraEvent::Failed { token: 1, error: CameraError::DeviceNotFound }).unwrap();
        tx.send(CameraEvent::Opened { token: 3, label: "new".into(), width: 1280, height: 720 })
            .unwrap();
        tx.send(CameraEvent::Failed { token: 2, error: CameraError::DeviceNotFound }).unwrap();

        let updates = session.poll();
        assert_eq!(
            updates,
            vec![SessionUpdate::Opened { label: "new".into(), width: 1280, height: 720 }]
        );
    }

    #[test]
    fn test_release_returns_without_waiting_for_capture_thread() {
        use std::time::{Duration, Instant};

        let mut session = CameraSession::new();
        // Thread busy inside a slow device open, not polling the stop flag
        session.set_stream_for_tests(CameraStream::stub_busy(1, Duration::from_secs(2)));

        let start = Instant::now();
        session.apply(false, None, &[]);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(!session.has_stream());
    }

    #[test]
    fn test_disable_releases_stream_exactly_once() {
        let mut session = CameraSession::new();
        session.set_stream_for_tests(CameraStream::stub(1));
        assert!(session.has_stream());

        // Disabling releases the stream; the stop is explicit, not deferred
        session.apply(false, None, &[]);
        assert!(!session.has_stream());

        // A second disable has nothing left to stop
        session.apply(false, None, &[]);
        assert!(!session.has_stream());
    }
}
