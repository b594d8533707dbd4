//! The face detection + embedding boundary.

use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use thiserror::Error;

/// One face found in an image, with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("detector error: {0}")]
    Detector(#[from] crate::detector::DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] crate::recognizer::RecognizerError),
    #[error("provider failed: {0}")]
    Other(String),
}

/// Produces face bounding boxes and embeddings for an image.
///
/// Implementations must be deterministic for a fixed image and model, and
/// return faces in a consistent order within one call. Bounding boxes are in
/// the pixel coordinates of the image that was passed in.
pub trait EmbeddingProvider {
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, ProviderError>;
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, ProviderError> {
        (**self).detect_and_encode(image)
    }
}
