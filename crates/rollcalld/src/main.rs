use anyhow::{Context, Result};
use rollcall_core::{AttendanceLog, EnrollmentDir, FrameProcessor, OnnxProvider, OverlayStyle};
use rollcall_hw::Camera;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod state;
mod video;

#[cfg(test)]
mod test_support;

const BUS_NAME: &str = "org.rollcall.Attendance1";
const OBJECT_PATH: &str = "/org/rollcall/Attendance1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = config::Config::from_env().context("invalid configuration")?;
    tracing::info!(
        device = %config.camera_device,
        models = %config.model_dir.display(),
        enrollment = %config.enrollment_dir.display(),
        log = %config.attendance_log.display(),
        tolerance = config.recognition.tolerance,
        cadence = config.recognition.detection_cadence,
        "configuration loaded"
    );

    // Fail fast: camera, models and storage must all be available at startup.
    let camera = Camera::open(&config.camera_device, config.camera_width, config.camera_height)
        .with_context(|| format!("failed to open camera {}", config.camera_device))?;

    let tick_provider = OnnxProvider::from_dir(&config.model_dir).context("failed to load models")?;
    let engine_provider = OnnxProvider::from_dir(&config.model_dir).context("failed to load models")?;
    tracing::info!(dir = %config.model_dir.display(), "models loaded");

    let enrollment = EnrollmentDir::open(&config.enrollment_dir)?;
    let log = AttendanceLog::new(&config.attendance_log);
    let state = state::SharedState::new();

    let engine = engine::spawn_engine(
        engine_provider,
        config.recognition.tolerance,
        state.clone(),
        log.clone(),
        enrollment,
    )?;

    let mut style = OverlayStyle::default();
    if let Some(path) = &config.label_font {
        match OverlayStyle::load_font(path) {
            Ok(font) => style = style.with_font(font),
            Err(e) => tracing::warn!(error = %e, "label font unavailable; drawing labels without text"),
        }
    }

    let processor = FrameProcessor::new(
        tick_provider,
        config.recognition,
        std::sync::Arc::clone(&state.gallery),
        std::sync::Arc::clone(&state.latest_capture),
    )?
    .with_style(style);

    let tick = video::spawn_tick_loop(
        camera,
        processor,
        state.clone(),
        video::TickSettings {
            interval: Duration::from_millis(config.tick_interval_ms),
            max_capture_failures: config.max_capture_failures,
        },
    )
    .context("failed to spawn tick thread")?;

    let service = dbus_interface::AttendanceService::new(engine, state, log, config.camera_device.clone());
    let connection = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on the session bus")?;

    tracing::info!(name = BUS_NAME, path = OBJECT_PATH, "rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    // Dropping the connection drops the service and with it the last engine handle.
    drop(connection);
    tokio::task::spawn_blocking(move || tick.stop()).await?;

    Ok(())
}
