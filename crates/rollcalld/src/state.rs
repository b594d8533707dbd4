use image::RgbImage;
use rollcall_core::{AnnotatedFrame, IdentityStore, SnapshotCell};
use serde::Serialize;
use std::sync::Arc;

/// Lifecycle of the capture device as seen by the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    Starting,
    Streaming,
    /// Too many consecutive capture failures; the tick loop has stopped.
    DeviceUnavailable,
    Stopped,
}

/// Snapshot cells shared between the tick thread, the engine thread and
/// the D-Bus handlers. Each cell has exactly one writer.
#[derive(Clone)]
pub struct SharedState {
    /// Written by the engine on startup, enroll and reload.
    pub gallery: Arc<SnapshotCell<IdentityStore>>,
    /// Written by the tick loop before annotation.
    pub latest_capture: Arc<SnapshotCell<RgbImage>>,
    /// Written by the tick loop after annotation.
    pub latest_annotated: Arc<SnapshotCell<AnnotatedFrame>>,
    /// Written by the tick loop on state transitions.
    pub camera: Arc<SnapshotCell<CameraState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            gallery: Arc::new(SnapshotCell::new(IdentityStore::default())),
            latest_capture: Arc::new(SnapshotCell::empty()),
            latest_annotated: Arc::new(SnapshotCell::empty()),
            camera: Arc::new(SnapshotCell::new(CameraState::Starting)),
        }
    }

    /// Current gallery; an empty store if none was published yet.
    pub fn gallery(&self) -> Arc<IdentityStore> {
        self.gallery.snapshot().unwrap_or_default()
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.snapshot().map_or(CameraState::Starting, |s| *s)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
