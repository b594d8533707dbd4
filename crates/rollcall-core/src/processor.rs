//! Per-frame recognition pipeline.
//!
//! Every frame is published as the most recent capture and annotated from
//! the recognition cache. Only every `detection_cadence`-th frame runs the
//! (downsampled) detection pass that replaces the cache, so overlays persist
//! between passes instead of flickering.

use crate::cache::{Cadence, RecognitionCache, RefreshState};
use crate::config::{ConfigError, RecognitionConfig};
use crate::matcher::{EuclideanMatcher, Matcher};
use crate::overlay::{draw_faces, OverlayStyle};
use crate::provider::{EmbeddingProvider, ProviderError};
use crate::snapshot::SnapshotCell;
use crate::store::IdentityStore;
use crate::types::DetectedFace;
use image::imageops::FilterType;
use image::RgbImage;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

/// Source of full-resolution video frames.
pub trait FrameSource {
    type Error: Display;

    fn capture(&mut self) -> Result<RgbImage, Self::Error>;
}

/// A frame with the current cache drawn onto it.
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub image: RgbImage,
    /// Faces drawn onto `image`, in full-resolution coordinates.
    pub faces: Arc<[DetectedFace]>,
    pub frame_index: u64,
    /// Whether a detection pass replaced the cache on this frame.
    pub refreshed: bool,
}

/// Outcome of one periodic tick.
#[derive(Debug)]
pub enum Tick {
    Rendered(AnnotatedFrame),
    /// No frame was available; nothing changed and the next tick retries.
    CaptureUnavailable(String),
}

pub struct FrameProcessor<P, M = EuclideanMatcher> {
    provider: P,
    matcher: M,
    config: RecognitionConfig,
    cadence: Cadence,
    gallery: Arc<SnapshotCell<IdentityStore>>,
    latest_capture: Arc<SnapshotCell<RgbImage>>,
    style: OverlayStyle,
    cache: RecognitionCache,
    frame_counter: u64,
}

impl<P: EmbeddingProvider> FrameProcessor<P> {
    /// Build a processor; fails if `config` does not validate.
    pub fn new(
        provider: P,
        config: RecognitionConfig,
        gallery: Arc<SnapshotCell<IdentityStore>>,
        latest_capture: Arc<SnapshotCell<RgbImage>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            provider,
            matcher: EuclideanMatcher,
            cadence: Cadence::new(config.detection_cadence),
            config,
            gallery,
            latest_capture,
            style: OverlayStyle::default(),
            cache: RecognitionCache::default(),
            frame_counter: 0,
        })
    }
}

impl<P: EmbeddingProvider, M: Matcher> FrameProcessor<P, M> {
    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn cache(&self) -> &RecognitionCache {
        &self.cache
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Refresh state for the next frame to be processed.
    pub fn refresh_state(&self) -> RefreshState {
        self.cadence.state_for(self.frame_counter)
    }

    /// Capture one frame from `source` and process it.
    ///
    /// A failed capture skips the tick entirely: the cache and frame counter
    /// are left untouched.
    pub fn tick<S: FrameSource>(&mut self, source: &mut S) -> Tick {
        match source.capture() {
            Ok(frame) => Tick::Rendered(self.on_frame(frame)),
            Err(e) => {
                tracing::debug!(frame = self.frame_counter, error = %e, "capture unavailable; skipping tick");
                Tick::CaptureUnavailable(e.to_string())
            }
        }
    }

    /// Publish `raw` as the most recent capture, refresh the cache if due,
    /// and return the frame with the cached faces drawn on it.
    pub fn on_frame(&mut self, raw: RgbImage) -> AnnotatedFrame {
        let raw = Arc::new(raw);
        self.latest_capture.publish_arc(Arc::clone(&raw));

        let refreshed = match self.refresh_state() {
            RefreshState::AwaitingRefresh => self.refresh(&raw),
            RefreshState::CacheValid => false,
        };

        let mut image = RgbImage::clone(&raw);
        let faces = Arc::clone(self.cache.faces());
        draw_faces(&mut image, &faces, &self.style);

        let frame_index = self.frame_counter;
        self.frame_counter += 1;

        AnnotatedFrame {
            image,
            faces,
            frame_index,
            refreshed,
        }
    }

    /// Run the downsampled detection pass and replace the cache.
    ///
    /// On provider failure the previous cache stays in place.
    fn refresh(&mut self, frame: &RgbImage) -> bool {
        let started = Instant::now();
        let factor = self.config.downsample_factor;
        let small = downsample(frame, factor);

        match self.recognize(&small) {
            Ok(faces) => {
                let restore = 1.0 / factor;
                let faces: Vec<DetectedFace> = faces
                    .into_iter()
                    .map(|face| DetectedFace {
                        bbox: face.bbox.scaled(restore),
                        recognition: face.recognition,
                    })
                    .collect();

                tracing::debug!(
                    frame = self.frame_counter,
                    faces = faces.len(),
                    known = faces.iter().filter(|f| f.recognition.is_known()).count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "recognition pass"
                );

                self.cache = RecognitionCache::new(faces, self.frame_counter);
                true
            }
            Err(e) => {
                tracing::warn!(frame = self.frame_counter, error = %e, "recognition pass failed; keeping previous cache");
                false
            }
        }
    }

    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ProviderError> {
        let encodings = self.provider.detect_and_encode(image)?;
        let gallery = self.gallery.snapshot();
        let empty = IdentityStore::default();
        let store = gallery.as_deref().unwrap_or(&empty);

        Ok(encodings
            .into_iter()
            .map(|enc| DetectedFace {
                bbox: enc.bbox,
                recognition: self
                    .matcher
                    .compare(&enc.embedding, store, self.config.tolerance)
                    .recognition,
            })
            .collect())
    }
}

/// Scale `frame` by `factor` on both axes (at least 1×1).
///
/// Output dimensions are rounded to whole pixels, so the effective scale can
/// differ slightly from `factor` (643×481 at 0.2 becomes 129×96). Boxes are
/// restored with `1 / factor`, leaving up to half a downsampled pixel of error
/// (2.5 px at 0.2) near the far edges.
pub fn downsample(frame: &RgbImage, factor: f32) -> RgbImage {
    if factor >= 1.0 {
        return frame.clone();
    }
    let (w, h) = frame.dimensions();
    let new_w = ((w as f32 * factor).round() as u32).max(1);
    let new_h = ((h as f32 * factor).round() as u32).max(1);
    image::imageops::resize(frame, new_w, new_h, FilterType::Triangle)
}
