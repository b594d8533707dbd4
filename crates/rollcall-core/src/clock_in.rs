//! User-triggered attendance check-in.
//!
//! Always runs a fresh detection pass on the full-resolution capture; the
//! periodic recognition cache is never consulted.

use crate::attendance::{AttendanceError, AttendanceLog, AttendanceRecord};
use crate::matcher::Matcher;
use crate::provider::{EmbeddingProvider, ProviderError};
use crate::store::IdentityStore;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClockInError {
    #[error("no camera frame captured yet")]
    CaptureUnavailable,
    #[error("no face detected")]
    NoFaceDetected,
    #[error("none of {faces} detected face(s) matched an enrolled identity")]
    NotRecognized {
        faces: usize,
        best_distance: Option<f32>,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
}

impl ClockInError {
    /// Conditions the user can retry from, as opposed to broken storage or
    /// a failing model.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClockInError::CaptureUnavailable | ClockInError::NoFaceDetected | ClockInError::NotRecognized { .. }
        )
    }
}

/// A face accepted as an enrolled identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub name: String,
    pub distance: f32,
    /// Position of the accepted face in detection order.
    pub face_index: usize,
}

/// Find the first detected face (in detection order) that matches a known
/// identity.
pub fn identify<P, M>(
    provider: &mut P,
    matcher: &M,
    store: &IdentityStore,
    tolerance: f32,
    frame: &RgbImage,
) -> Result<Identification, ClockInError>
where
    P: EmbeddingProvider + ?Sized,
    M: Matcher + ?Sized,
{
    let faces = provider.detect_and_encode(frame)?;
    if faces.is_empty() {
        return Err(ClockInError::NoFaceDetected);
    }

    let mut best_distance: Option<f32> = None;
    for (face_index, face) in faces.iter().enumerate() {
        let result = matcher.compare(&face.embedding, store, tolerance);
        if let Some(d) = result.distance {
            best_distance = Some(best_distance.map_or(d, |b| b.min(d)));
        }
        if let (Some(name), Some(distance)) = (result.recognition.known_name(), result.distance) {
            return Ok(Identification {
                name: name.to_string(),
                distance,
                face_index,
            });
        }
    }

    Err(ClockInError::NotRecognized {
        faces: faces.len(),
        best_distance,
    })
}

/// Identify the person in `frame` and append an attendance record for them.
///
/// Nothing is written unless a face is accepted.
pub fn clock_in<P, M>(
    provider: &mut P,
    matcher: &M,
    store: &IdentityStore,
    tolerance: f32,
    frame: Option<&RgbImage>,
    log: &AttendanceLog,
) -> Result<AttendanceRecord, ClockInError>
where
    P: EmbeddingProvider + ?Sized,
    M: Matcher + ?Sized,
{
    let frame = frame.ok_or(ClockInError::CaptureUnavailable)?;
    let id = identify(provider, matcher, store, tolerance, frame)?;
    tracing::info!(name = %id.name, distance = id.distance, face = id.face_index, "clock-in accepted");
    Ok(log.record_now(&id.name)?)
}
