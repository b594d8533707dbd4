//! Draws cached recognition results onto video frames.

use crate::types::DetectedFace;
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

const KNOWN_COLOR: Rgb<u8> = Rgb([255, 166, 88]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([100, 100, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: u32 = 3;
const LABEL_GAP: i32 = 2;
const LABEL_HEIGHT: u32 = 30;
const LABEL_TEXT_INSET: i32 = 8;
const LABEL_TEXT_SCALE: f32 = 22.0;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to read label font {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid label font {0}")]
    InvalidFont(String),
}

/// Colors and font used for face annotations.
#[derive(Clone)]
pub struct OverlayStyle {
    pub known: Rgb<u8>,
    pub unknown: Rgb<u8>,
    /// Name text is only rendered when a font is available; the label bar is
    /// drawn either way.
    pub font: Option<FontArc>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            known: KNOWN_COLOR,
            unknown: UNKNOWN_COLOR,
            font: None,
        }
    }
}

impl OverlayStyle {
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Load a TrueType/OpenType font for name labels.
    pub fn load_font(path: &Path) -> Result<FontArc, OverlayError> {
        let bytes = std::fs::read(path).map_err(|source| OverlayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        FontArc::try_from_vec(bytes).map_err(|_| OverlayError::InvalidFont(path.display().to_string()))
    }
}

impl std::fmt::Debug for OverlayStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStyle")
            .field("known", &self.known)
            .field("unknown", &self.unknown)
            .field("font", &self.font.is_some())
            .finish()
    }
}

/// Draw a box and a name label for every face.
pub fn draw_faces(image: &mut RgbImage, faces: &[DetectedFace], style: &OverlayStyle) {
    for face in faces {
        let left = face.bbox.left.round() as i32;
        let top = face.bbox.top.round() as i32;
        let width = face.bbox.width().round() as u32;
        let height = face.bbox.height().round() as u32;
        if width == 0 || height == 0 {
            continue;
        }

        let color = if face.recognition.is_known() { style.known } else { style.unknown };

        for k in 0..BOX_THICKNESS {
            let rect = Rect::at(left - k as i32, top - k as i32).of_size(width + 2 * k, height + 2 * k);
            draw_hollow_rect_mut(image, rect, color);
        }

        let label_top = top + height as i32 + LABEL_GAP;
        draw_filled_rect_mut(image, Rect::at(left, label_top).of_size(width, LABEL_HEIGHT), color);

        if let Some(font) = &style.font {
            let scale = PxScale::from(LABEL_TEXT_SCALE);
            let text_y = label_top + (LABEL_HEIGHT as i32 - LABEL_TEXT_SCALE as i32) / 2;
            draw_text_mut(
                image,
                TEXT_COLOR,
                left + LABEL_TEXT_INSET,
                text_y,
                scale,
                font,
                face.recognition.label(),
            );
        }
    }
}
