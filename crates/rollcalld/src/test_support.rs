//! Deterministic provider for daemon tests: an image whose first pixel has
//! a bright red channel holds one face, embedded as `[green / 100]`.

use image::{Rgb, RgbImage};
use rollcall_core::{BoundingBox, EmbeddingProvider, Embedding, FaceEncoding, ProviderError};

pub struct ToneProvider;

impl EmbeddingProvider for ToneProvider {
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, ProviderError> {
        let Rgb([red, tone, _]) = *image.get_pixel(0, 0);
        if red < 128 {
            return Ok(Vec::new());
        }
        Ok(vec![FaceEncoding {
            bbox: BoundingBox::new(2.0, 10.0, 10.0, 2.0),
            embedding: Embedding::new(vec![tone as f32 / 100.0]),
        }])
    }
}

pub fn face(tone: u8) -> RgbImage {
    RgbImage::from_pixel(16, 16, Rgb([255, tone, 0]))
}

pub fn no_face() -> RgbImage {
    RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]))
}
