//! Recognition results carried across frames between detection passes.

use crate::types::DetectedFace;
use std::sync::Arc;

/// Whether the current frame must run a detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// The cache is due for replacement on this frame.
    AwaitingRefresh,
    /// The cache is reused as-is on this frame.
    CacheValid,
}

/// Frame-counter driven transition rule: every `every`-th frame (starting
/// at frame 0) is a refresh frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u64,
}

impl Cadence {
    /// A cadence of 0 is treated as 1 (detect on every frame).
    pub fn new(every: u32) -> Self {
        Self { every: u64::from(every.max(1)) }
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    pub fn state_for(&self, frame: u64) -> RefreshState {
        if frame % self.every == 0 {
            RefreshState::AwaitingRefresh
        } else {
            RefreshState::CacheValid
        }
    }
}

/// The faces from the most recent detection pass, in full-resolution
/// coordinates.
///
/// Replaced wholesale after each pass and otherwise read-only; the face list
/// is shared so overlays and callers can hold it without copying.
#[derive(Debug, Clone)]
pub struct RecognitionCache {
    faces: Arc<[DetectedFace]>,
    produced_at_frame: Option<u64>,
}

impl Default for RecognitionCache {
    fn default() -> Self {
        Self {
            faces: Arc::from(Vec::new()),
            produced_at_frame: None,
        }
    }
}

impl RecognitionCache {
    pub fn new(faces: Vec<DetectedFace>, produced_at_frame: u64) -> Self {
        Self {
            faces: faces.into(),
            produced_at_frame: Some(produced_at_frame),
        }
    }

    pub fn faces(&self) -> &Arc<[DetectedFace]> {
        &self.faces
    }

    /// Frame index of the pass that produced this cache; `None` before the
    /// first pass.
    pub fn produced_at_frame(&self) -> Option<u64> {
        self.produced_at_frame
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
