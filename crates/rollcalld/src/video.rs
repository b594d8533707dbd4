use crate::state::{CameraState, SharedState};
use image::RgbImage;
use rollcall_core::{EmbeddingProvider, FrameProcessor, FrameSource, Tick};
use rollcall_hw::{Camera, CameraError, CameraStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// [`FrameSource`] over a streaming V4L2 camera.
pub struct CameraSource<'a> {
    stream: CameraStream<'a>,
}

impl FrameSource for CameraSource<'_> {
    type Error = CameraError;

    fn capture(&mut self) -> Result<RgbImage, CameraError> {
        self.stream.next_frame()
    }
}

/// Pacing and failure budget for [`run_tick_loop`].
#[derive(Debug, Clone, Copy)]
pub struct TickSettings {
    pub interval: Duration,
    pub max_capture_failures: u32,
}

/// Handle to the running tick thread.
pub struct TickHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl TickHandle {
    /// Ask the loop to stop after the in-flight tick and wait for it.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.thread.join().is_err() {
            tracing::error!("tick thread panicked");
        }
    }
}

/// Spawn the periodic tick loop on its own thread.
///
/// The camera is moved into the thread and streamed there; each tick
/// completes before the next one is scheduled.
pub fn spawn_tick_loop<P>(
    camera: Camera,
    processor: FrameProcessor<P>,
    state: SharedState,
    settings: TickSettings,
) -> std::io::Result<TickHandle>
where
    P: EmbeddingProvider + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name("rollcall-tick".into())
        .spawn(move || {
            let mut processor = processor;
            let stream = match camera.stream() {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(device = %camera.device_path, error = %e, "failed to start camera stream");
                    state.camera.publish(CameraState::DeviceUnavailable);
                    return;
                }
            };
            let mut source = CameraSource { stream };
            run_tick_loop(&mut processor, &mut source, &state, settings, &thread_stop);
        })?;

    Ok(TickHandle { stop, thread })
}

/// Drive `processor` from `source` until `stop` is set or the capture
/// failure budget is exhausted.
///
/// Annotated frames are published to `state.latest_annotated`; camera
/// state transitions are published to `state.camera`.
pub fn run_tick_loop<P, S>(
    processor: &mut FrameProcessor<P>,
    source: &mut S,
    state: &SharedState,
    settings: TickSettings,
    stop: &AtomicBool,
) where
    P: EmbeddingProvider,
    S: FrameSource,
{
    tracing::info!(interval_ms = settings.interval.as_millis() as u64, "tick loop started");
    let mut consecutive_failures: u32 = 0;
    let mut streaming = false;

    while !stop.load(Ordering::Relaxed) {
        match processor.tick(source) {
            Tick::Rendered(frame) => {
                if !streaming {
                    streaming = true;
                    state.camera.publish(CameraState::Streaming);
                    tracing::info!(frame = frame.frame_index, "camera streaming");
                }
                if frame.refreshed {
                    tracing::debug!(frame = frame.frame_index, faces = frame.faces.len(), "recognition refreshed");
                }
                consecutive_failures = 0;
                state.latest_annotated.publish(frame);
            }
            Tick::CaptureUnavailable(reason) => {
                consecutive_failures += 1;
                if consecutive_failures >= settings.max_capture_failures {
                    tracing::error!(
                        failures = consecutive_failures,
                        last_error = %reason,
                        "camera unavailable; stopping tick loop"
                    );
                    state.camera.publish(CameraState::DeviceUnavailable);
                    return;
                }
            }
        }
        std::thread::sleep(settings.interval);
    }

    state.camera.publish(CameraState::Stopped);
    tracing::info!(frames = processor.frame_counter(), "tick loop stopped");
}
