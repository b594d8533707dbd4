//! [`EmbeddingProvider`] backed by SCRFD detection and ArcFace recognition.

use crate::detector::FaceDetector;
use crate::provider::{EmbeddingProvider, FaceEncoding, ProviderError};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use image::RgbImage;
use std::path::Path;

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

pub struct OnnxProvider {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxProvider {
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self { detector, recognizer })
    }

    /// Load both models from their standard file names inside `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Result<Self, ProviderError> {
        let path = |file: &str| model_dir.join(file).to_string_lossy().into_owned();
        Self::load(&path(SCRFD_MODEL_FILE), &path(ARCFACE_MODEL_FILE))
    }
}

impl EmbeddingProvider for OnnxProvider {
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, ProviderError> {
        let detections = self.detector.detect(image)?;
        let mut faces = Vec::with_capacity(detections.len());
        for det in &detections {
            match self.recognizer.extract(image, det) {
                Ok(embedding) => faces.push(FaceEncoding { bbox: det.bbox, embedding }),
                // A face without usable landmarks cannot be embedded; drop it.
                Err(RecognizerError::NoLandmarks) => {
                    tracing::debug!(confidence = det.confidence, "dropping face without usable landmarks");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(faces)
    }
}
