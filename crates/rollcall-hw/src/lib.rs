//! rollcall-hw: Camera capture for the recognition pipeline.
//!
//! Provides V4L2-based camera access that yields full-resolution RGB frames
//! from YUYV, MJPG or GREY devices.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::FrameError;
