use crate::engine::{EngineError, EngineHandle, EnrollSource};
use crate::state::SharedState;
use rollcall_core::attendance::DEFAULT_HISTORY_LIMIT;
use rollcall_core::{AttendanceLog, ClockInError, EnrollError};
use serde_json::{json, Value};
use std::path::PathBuf;
use zbus::interface;

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
///
/// Actions reply with a JSON object carrying `"ok"`. Recoverable outcomes
/// (no face, not recognized, duplicate name, ...) are `"ok": false` with a
/// `"reason"`; storage and model failures are D-Bus errors.
pub struct AttendanceService {
    engine: EngineHandle,
    state: SharedState,
    log: AttendanceLog,
    device: String,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle, state: SharedState, log: AttendanceLog, device: String) -> Self {
        Self {
            engine,
            state,
            log,
            device,
        }
    }
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Identify the person in front of the camera and record their attendance.
    async fn clock_in(&self) -> zbus::fdo::Result<String> {
        tracing::info!("clock_in requested");
        let result = self.engine.clock_in().await;
        outcome(result, |record| {
            json!({
                "name": record.name,
                "timestamp": record.timestamp,
            })
        })
    }

    /// Enroll the most recent capture under `name`.
    async fn enroll(&self, name: &str, replace: bool) -> zbus::fdo::Result<String> {
        tracing::info!(name, replace, "enroll requested");
        let result = self.engine.enroll(name.to_string(), EnrollSource::Capture, replace).await;
        outcome(result, enrolled_json)
    }

    /// Enroll an image file (readable by the daemon) under `name`.
    async fn enroll_from_file(&self, name: &str, path: &str, replace: bool) -> zbus::fdo::Result<String> {
        tracing::info!(name, path, replace, "enroll_from_file requested");
        let source = EnrollSource::File(PathBuf::from(path));
        let result = self.engine.enroll(name.to_string(), source, replace).await;
        outcome(result, enrolled_json)
    }

    /// Most recent attendance records, newest first. A `limit` of 0 uses the default.
    async fn recent_history(&self, limit: u32) -> zbus::fdo::Result<String> {
        let limit = if limit == 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            limit as usize
        };
        let log = self.log.clone();
        let records = tokio::task::spawn_blocking(move || log.recent_history(limit))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?
            .map_err(|e| {
                tracing::error!(error = %e, "failed to read attendance log");
                zbus::fdo::Error::Failed(e.to_string())
            })?;
        serde_json::to_string(&records).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// The most recent annotated frame, PNG-encoded.
    async fn annotated_frame(&self) -> zbus::fdo::Result<Vec<u8>> {
        let frame = self
            .state
            .latest_annotated
            .snapshot()
            .ok_or_else(|| zbus::fdo::Error::Failed("no frame rendered yet".into()))?;
        tokio::task::spawn_blocking(move || {
            let mut png = std::io::Cursor::new(Vec::new());
            frame.image.write_to(&mut png, image::ImageFormat::Png)?;
            Ok::<_, image::ImageError>(png.into_inner())
        })
        .await
        .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?
        .map_err(|e| zbus::fdo::Error::Failed(format!("PNG encoding failed: {e}")))
    }

    /// Rebuild the gallery from the enrollment directory.
    async fn reload(&self) -> zbus::fdo::Result<String> {
        tracing::info!("reload requested");
        let result = self.engine.reload().await;
        outcome(result, |report| {
            json!({
                "registered": report.registered,
                "skipped": report.skipped,
                "duplicates": report.duplicates,
            })
        })
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let gallery = self.state.gallery();
        let latest = self.state.latest_annotated.snapshot();
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "camera": self.state.camera_state(),
            "device": self.device,
            "identities": gallery.names().collect::<Vec<_>>(),
            "frames": latest.as_ref().map_or(0, |f| f.frame_index + 1),
            "visible": latest
                .as_ref()
                .map(|f| f.faces.iter().map(|face| face.recognition.label().to_string()).collect::<Vec<_>>())
                .unwrap_or_default(),
        })
        .to_string())
    }
}

fn enrolled_json(done: crate::engine::EnrollResult) -> Value {
    json!({
        "name": done.name,
        "path": done.path.display().to_string(),
        "registered": done.report.registered,
        "skipped": done.report.skipped,
    })
}

/// Render an engine result as a JSON reply, or a D-Bus error for terminal
/// failures.
fn outcome<T>(result: Result<T, EngineError>, render: impl FnOnce(T) -> Value) -> zbus::fdo::Result<String> {
    match result {
        Ok(value) => {
            let mut body = render(value);
            body["ok"] = Value::Bool(true);
            Ok(body.to_string())
        }
        Err(e) if e.is_recoverable() => Ok(json!({
            "ok": false,
            "reason": reason_code(&e),
            "message": e.to_string(),
        })
        .to_string()),
        Err(e) => {
            tracing::error!(error = %e, "request failed");
            Err(zbus::fdo::Error::Failed(e.to_string()))
        }
    }
}

fn reason_code(e: &EngineError) -> &'static str {
    match e {
        EngineError::CaptureUnavailable | EngineError::ClockIn(ClockInError::CaptureUnavailable) => {
            "capture_unavailable"
        }
        EngineError::ClockIn(ClockInError::NoFaceDetected) | EngineError::Enroll(EnrollError::NoFaceDetected(_)) => {
            "no_face_detected"
        }
        EngineError::ClockIn(ClockInError::NotRecognized { .. }) => "not_recognized",
        EngineError::Enroll(EnrollError::InvalidName(_)) => "invalid_name",
        EngineError::Enroll(EnrollError::DuplicateName(_)) => "duplicate_name",
        EngineError::ImageFile { .. } => "unreadable_image",
        _ => "failed",
    }
}
