use crate::state::SharedState;
use image::RgbImage;
use rollcall_core::{
    AttendanceLog, AttendanceRecord, ClockInError, EmbeddingProvider, EnrollError, EnrollmentDir,
    EuclideanMatcher, LoadReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    ClockIn(#[from] ClockInError),
    #[error(transparent)]
    Enroll(#[from] EnrollError),
    #[error("no camera frame captured yet")]
    CaptureUnavailable,
    #[error("failed to read image {path}: {source}")]
    ImageFile {
        path: String,
        source: image::ImageError,
    },
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

impl EngineError {
    /// Outcomes the caller can act on (retry, pick another name or file),
    /// as opposed to broken storage, a failing model or a dead engine.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::ClockIn(e) => e.is_recoverable(),
            EngineError::Enroll(e) => matches!(
                e,
                EnrollError::InvalidName(_) | EnrollError::DuplicateName(_) | EnrollError::NoFaceDetected(_)
            ),
            EngineError::CaptureUnavailable | EngineError::ImageFile { .. } => true,
            EngineError::Spawn(_) | EngineError::ChannelClosed => false,
        }
    }
}

/// Where an enrollment image comes from.
#[derive(Debug, Clone)]
pub enum EnrollSource {
    /// The most recent camera capture.
    Capture,
    File(PathBuf),
}

/// Result of a successful enrollment.
pub struct EnrollResult {
    pub name: String,
    pub path: PathBuf,
    pub report: LoadReport,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    ClockIn {
        reply: oneshot::Sender<Result<AttendanceRecord, EngineError>>,
    },
    Enroll {
        name: String,
        source: EnrollSource,
        replace: bool,
        reply: oneshot::Sender<Result<EnrollResult, EngineError>>,
    },
    Reload {
        reply: oneshot::Sender<Result<LoadReport, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Identify the person in the most recent capture and log their attendance.
    pub async fn clock_in(&self) -> Result<AttendanceRecord, EngineError> {
        self.request(|reply| EngineRequest::ClockIn { reply }).await
    }

    /// Enroll a new identity and publish the rebuilt gallery.
    pub async fn enroll(&self, name: String, source: EnrollSource, replace: bool) -> Result<EnrollResult, EngineError> {
        self.request(|reply| EngineRequest::Enroll {
            name,
            source,
            replace,
            reply,
        })
        .await
    }

    /// Rebuild the gallery from the enrollment directory.
    pub async fn reload(&self) -> Result<LoadReport, EngineError> {
        self.request(|reply| EngineRequest::Reload { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// State owned by the engine thread.
struct Engine<P> {
    provider: P,
    matcher: EuclideanMatcher,
    tolerance: f32,
    state: SharedState,
    log: AttendanceLog,
    enrollment: EnrollmentDir,
}

/// Spawn the engine on a dedicated OS thread.
///
/// Builds and publishes the initial gallery before returning, then serves
/// clock-in, enroll and reload requests one at a time. The thread exits once
/// every [`EngineHandle`] is dropped.
pub fn spawn_engine<P>(
    mut provider: P,
    tolerance: f32,
    state: SharedState,
    log: AttendanceLog,
    enrollment: EnrollmentDir,
) -> Result<EngineHandle, EngineError>
where
    P: EmbeddingProvider + Send + 'static,
{
    let (store, report) = rollcall_core::rebuild_store(&enrollment, &mut provider)?;
    tracing::info!(
        dir = %enrollment.root().display(),
        registered = report.registered,
        skipped = report.skipped.len(),
        "gallery loaded"
    );
    state.gallery.publish(store);

    let mut engine = Engine {
        provider,
        matcher: EuclideanMatcher,
        tolerance,
        state,
        log,
        enrollment,
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::ClockIn { reply } => {
                        let _ = reply.send(engine.clock_in());
                    }
                    EngineRequest::Enroll {
                        name,
                        source,
                        replace,
                        reply,
                    } => {
                        let _ = reply.send(engine.enroll(&name, source, replace));
                    }
                    EngineRequest::Reload { reply } => {
                        let _ = reply.send(engine.reload());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

impl<P: EmbeddingProvider> Engine<P> {
    fn clock_in(&mut self) -> Result<AttendanceRecord, EngineError> {
        let store = self.state.gallery();
        let frame = self.state.latest_capture.snapshot();
        let result = rollcall_core::clock_in(
            &mut self.provider,
            &self.matcher,
            &store,
            self.tolerance,
            frame.as_deref(),
            &self.log,
        );
        match &result {
            Ok(record) => tracing::info!(name = %record.name, "attendance recorded"),
            Err(e) if e.is_recoverable() => tracing::info!(reason = %e, "clock-in rejected"),
            Err(e) => tracing::error!(error = %e, "clock-in failed"),
        }
        Ok(result?)
    }

    fn enroll(&mut self, name: &str, source: EnrollSource, replace: bool) -> Result<EnrollResult, EngineError> {
        let image: Arc<RgbImage> = match source {
            EnrollSource::Capture => self
                .state
                .latest_capture
                .snapshot()
                .ok_or(EngineError::CaptureUnavailable)?,
            EnrollSource::File(path) => {
                let img = image::open(&path).map_err(|source| EngineError::ImageFile {
                    path: path.display().to_string(),
                    source,
                })?;
                Arc::new(img.to_rgb8())
            }
        };

        let enrolled = rollcall_core::enroll(&self.enrollment, name, &image, replace, &mut self.provider)?;
        tracing::info!(
            name = %enrolled.name,
            registered = enrolled.report.registered,
            "enrolled; publishing rebuilt gallery"
        );
        self.state.gallery.publish(enrolled.store);

        Ok(EnrollResult {
            name: enrolled.name,
            path: enrolled.path,
            report: enrolled.report,
        })
    }

    fn reload(&mut self) -> Result<LoadReport, EngineError> {
        let (store, report) = rollcall_core::rebuild_store(&self.enrollment, &mut self.provider)?;
        tracing::info!(registered = report.registered, skipped = report.skipped.len(), "gallery reloaded");
        self.state.gallery.publish(store);
        Ok(report)
    }
}
