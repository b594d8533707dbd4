use crate::matcher::DEFAULT_TOLERANCE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Run a detection pass every this many frames.
pub const DEFAULT_DETECTION_CADENCE: u32 = 45;
/// Linear scale applied to a frame before the periodic detection pass.
pub const DEFAULT_DOWNSAMPLE_FACTOR: f32 = 0.2;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("tolerance must be a positive finite number, got {0}")]
    Tolerance(f32),
    #[error("detection cadence must be at least 1 frame")]
    Cadence,
    #[error("downsample factor must be in (0, 1], got {0}")]
    DownsampleFactor(f32),
}

/// Recognition knobs shared by the periodic pipeline and clock-in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Maximum Euclidean distance for a positive match. Lower is stricter.
    pub tolerance: f32,
    /// Frames between detection passes; frames in between reuse the cache.
    pub detection_cadence: u32,
    /// Scale applied before periodic detection (accuracy vs. cost).
    pub downsample_factor: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            detection_cadence: DEFAULT_DETECTION_CADENCE,
            downsample_factor: DEFAULT_DOWNSAMPLE_FACTOR,
        }
    }
}

impl RecognitionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::Tolerance(self.tolerance));
        }
        if self.detection_cadence == 0 {
            return Err(ConfigError::Cadence);
        }
        if !(self.downsample_factor > 0.0 && self.downsample_factor <= 1.0) {
            return Err(ConfigError::DownsampleFactor(self.downsample_factor));
        }
        Ok(())
    }
}
