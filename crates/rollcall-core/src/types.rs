use serde::{Deserialize, Serialize};
use std::fmt;

/// Label drawn and reported for a face that matched no enrolled identity.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Face bounding box in pixel coordinates of the frame it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl BoundingBox {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self { top, right, bottom, left }
    }

    /// Multiply every coordinate by `factor`.
    ///
    /// Used to map boxes found on a downsampled frame back to the
    /// full-resolution frame (`factor = 1 / downsample_factor`).
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }
}

/// Face embedding vector (512-dimensional for the ArcFace provider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Whether two embeddings live in the same space: same length and, when
    /// both record one, the same model version.
    pub fn is_comparable(&self, other: &Embedding) -> bool {
        if self.values.len() != other.values.len() {
            return false;
        }
        match (&self.model_version, &other.model_version) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Embeddings from different spaces are infinitely far apart, so they
    /// never pass a tolerance check.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        if !self.is_comparable(other) {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// An enrolled person: display name plus the embedding derived from their
/// enrollment image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub embedding: Embedding,
}

/// Outcome of matching one face against the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recognition {
    Known(String),
    Unknown,
}

impl Recognition {
    /// Name to display; the `"Unknown"` sentinel for unmatched faces.
    pub fn label(&self) -> &str {
        match self {
            Recognition::Known(name) => name,
            Recognition::Unknown => UNKNOWN_LABEL,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Recognition::Known(_))
    }

    pub fn known_name(&self) -> Option<&str> {
        match self {
            Recognition::Known(name) => Some(name),
            Recognition::Unknown => None,
        }
    }
}

impl fmt::Display for Recognition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A face found during one detection pass, already resolved to a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub recognition: Recognition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_distance_across_spaces_is_infinite() {
        let short = Embedding::new(vec![0.0, 0.0]);
        let long = Embedding::new(vec![0.0, 0.0, 5.0]);
        assert_eq!(short.euclidean_distance(&long), f32::INFINITY);
        assert_eq!(long.euclidean_distance(&short), f32::INFINITY);

        let v1 = Embedding {
            values: vec![1.0, 0.0],
            model_version: Some("w600k_r50".into()),
        };
        let v2 = Embedding {
            model_version: Some("glint360k_r100".into()),
            ..v1.clone()
        };
        assert!(!v1.is_comparable(&v2));
        assert_eq!(v1.euclidean_distance(&v2), f32::INFINITY);
        // An unversioned embedding compares with any version of the same length.
        assert_eq!(v1.euclidean_distance(&Embedding::new(vec![1.0, 0.0])), 0.0);
    }

    #[test]
    fn test_bbox_scaled() {
        let b = BoundingBox::new(10.0, 40.0, 30.0, 20.0).scaled(5.0);
        assert_eq!(b, BoundingBox::new(50.0, 200.0, 150.0, 100.0));
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 100.0);
    }

    #[test]
    fn test_recognition_label() {
        assert_eq!(Recognition::Known("Alice".into()).label(), "Alice");
        assert_eq!(Recognition::Unknown.label(), UNKNOWN_LABEL);
        assert_eq!(Recognition::Unknown.to_string(), "Unknown");
        assert!(Recognition::Unknown.known_name().is_none());
    }
}
