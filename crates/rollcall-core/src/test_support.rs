//! Deterministic provider used by unit tests.
//!
//! Test images are uniform: the red channel encodes the number of faces in
//! steps of [`FACE_STEP`] (coarse enough to survive JPEG), the green channel
//! is a "tone" that becomes the first embedding component (`tone / 100`).

use crate::provider::{EmbeddingProvider, FaceEncoding, ProviderError};
use crate::types::{BoundingBox, Embedding};
use image::{Rgb, RgbImage};

const FACE_STEP: u8 = 32;

pub fn face_image(faces: u8, tone: u8) -> RgbImage {
    sized_face_image(20, 20, faces, tone)
}

pub fn sized_face_image(width: u32, height: u32, faces: u8, tone: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([faces * FACE_STEP, tone, 0]))
}

/// Box returned for the `i`-th face, in the coordinates of the image passed in.
pub fn fake_box(i: usize) -> BoundingBox {
    let k = (i + 1) as f32;
    BoundingBox::new(k, 2.0 * k + 4.0, k + 4.0, 2.0 * k)
}

pub fn tone_embedding(tone: u8, i: usize) -> Embedding {
    Embedding::new(vec![tone as f32 / 100.0, i as f32])
}

#[derive(Default)]
pub struct FakeProvider {
    /// Dimensions of every image seen, in call order.
    pub calls: Vec<(u32, u32)>,
    pub fail: bool,
}

impl EmbeddingProvider for FakeProvider {
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, ProviderError> {
        self.calls.push(image.dimensions());
        if self.fail {
            return Err(ProviderError::Other("scripted failure".into()));
        }
        let Rgb([red, tone, _]) = *image.get_pixel(0, 0);
        let faces = (red as usize + FACE_STEP as usize / 2) / FACE_STEP as usize;
        Ok((0..faces)
            .map(|i| FaceEncoding {
                bbox: fake_box(i),
                embedding: tone_embedding(tone, i),
            })
            .collect())
    }
}
