//! eduscan-hw — Frame sources and audio capture.
//!
//! Provides the [`FrameSource`] seam the recognition loop reads from, a
//! still-image source, V4L2 webcam capture (`v4l` feature) and microphone
//! recording (`mic` feature).

pub mod frame;
pub mod source;
pub mod wav;

#[cfg(feature = "v4l")]
pub mod camera;
#[cfg(feature = "mic")]
pub mod microphone;

pub use frame::Frame;
pub use source::{CameraError, FrameSource, StillImage};

#[cfg(feature = "v4l")]
pub use camera::Camera;
#[cfg(feature = "mic")]
pub use microphone::{AudioError, Microphone};
