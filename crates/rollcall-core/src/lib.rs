//! rollcall-core: Real-time face recognition and attendance logging.
//!
//! Matches face embeddings against a small enrolled set, carries the latest
//! recognition results across video frames, and records clock-in events.
//! Embeddings come from any [`EmbeddingProvider`]; [`OnnxProvider`] runs
//! SCRFD detection and ArcFace recognition on ONNX Runtime.

pub mod alignment;
pub mod attendance;
pub mod cache;
pub mod clock_in;
pub mod config;
pub mod detector;
pub mod enrollment;
pub mod matcher;
pub mod onnx;
pub mod overlay;
pub mod processor;
pub mod provider;
pub mod recognizer;
pub mod snapshot;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use attendance::{AttendanceError, AttendanceLog, AttendanceRecord};
pub use cache::{Cadence, RecognitionCache, RefreshState};
pub use clock_in::{clock_in, identify, ClockInError, Identification};
pub use config::{ConfigError, RecognitionConfig};
pub use enrollment::{enroll, rebuild_store, validate_name, EnrollError, Enrolled, EnrollmentDir};
pub use matcher::{EuclideanMatcher, MatchResult, Matcher};
pub use onnx::OnnxProvider;
pub use overlay::OverlayStyle;
pub use processor::{AnnotatedFrame, FrameProcessor, FrameSource, Tick};
pub use provider::{EmbeddingProvider, FaceEncoding, ProviderError};
pub use snapshot::SnapshotCell;
pub use store::{IdentityStore, LoadReport, StoreError};
pub use types::{BoundingBox, DetectedFace, Embedding, Identity, Recognition, UNKNOWN_LABEL};
