//! Construction of the hardware and model backends selected at build time.
//!
//! Each function fails with a descriptive error when the binary was built
//! without the cargo feature it needs.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use eduscan_core::{FaceEncoder, VoiceEncoder, VoiceMatcher};
use eduscan_hw::{FrameSource, StillImage};
use std::path::Path;

/// A still image when `image` is given, otherwise the configured camera.
pub fn open_source(config: &Config, image: Option<&Path>) -> Result<Box<dyn FrameSource>> {
    match image {
        Some(path) => {
            let still = StillImage::open(path)
                .with_context(|| format!("failed to open image {}", path.display()))?;
            Ok(Box::new(still))
        }
        None => open_camera(config),
    }
}

#[cfg(feature = "v4l")]
pub fn open_camera(config: &Config) -> Result<Box<dyn FrameSource>> {
    let mut camera = eduscan_hw::Camera::open(
        &config.camera_device,
        Some((config.capture_width, config.capture_height)),
    )
    .with_context(|| format!("failed to open camera {}", config.camera_device))?;

    for _ in 0..config.warmup_frames {
        if let Err(e) = camera.read_frame() {
            tracing::debug!(error = %e, "warmup frame dropped");
        }
    }
    Ok(Box::new(camera))
}

#[cfg(not(feature = "v4l"))]
pub fn open_camera(config: &Config) -> Result<Box<dyn FrameSource>> {
    bail!(
        "cannot open {}: eduscan was built without the `v4l` feature (pass --image to use a still photo)",
        config.camera_device
    )
}

#[cfg(feature = "onnx")]
pub fn face_encoder(config: &Config) -> Result<Box<dyn FaceEncoder>> {
    let dir = &config.model_dir;
    let encoder = eduscan_core::onnx::OnnxFaceEncoder::load(dir)
        .with_context(|| format!("failed to load models from {}", dir.display()))?;
    Ok(Box::new(encoder))
}

#[cfg(not(feature = "onnx"))]
pub fn face_encoder(config: &Config) -> Result<Box<dyn FaceEncoder>> {
    bail!(
        "face recognition unavailable: built without the `onnx` feature (models dir {})",
        config.model_dir.display()
    )
}

#[cfg(feature = "onnx")]
pub fn voice_matcher(config: &Config) -> Result<VoiceMatcher<Box<dyn VoiceEncoder>>> {
    let path = config.model_dir.join(eduscan_core::onnx::SPEAKER_MODEL);
    let encoder = eduscan_core::onnx::OnnxVoiceEncoder::load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(VoiceMatcher::new(Box::new(encoder), config.voice_threshold))
}

#[cfg(not(feature = "onnx"))]
pub fn voice_matcher(config: &Config) -> Result<VoiceMatcher<Box<dyn VoiceEncoder>>> {
    bail!(
        "voice matching unavailable: built without the `onnx` feature (threshold {})",
        config.voice_threshold
    )
}

/// Record `voice_record_secs` of audio from the default microphone into `path`.
#[cfg(feature = "mic")]
pub fn record_voice(config: &Config, path: &Path) -> Result<()> {
    let mic = eduscan_hw::Microphone::open_default().context("failed to open microphone")?;
    let duration = std::time::Duration::from_secs(config.voice_record_secs);
    mic.record_wav(path, duration)
        .with_context(|| format!("failed to record to {}", path.display()))
}

#[cfg(not(feature = "mic"))]
pub fn record_voice(config: &Config, path: &Path) -> Result<()> {
    bail!(
        "cannot record {}s to {}: eduscan was built without the `mic` feature",
        config.voice_record_secs,
        path.display()
    )
}

/// `(path, description)` for every capture device found.
#[cfg(feature = "v4l")]
pub fn list_cameras() -> Vec<(String, String)> {
    eduscan_hw::camera::Camera::list_devices()
        .into_iter()
        .map(|d| {
            let description = format!("{} ({}, {})", d.name, d.driver, d.bus);
            (d.path, description)
        })
        .collect()
}

#[cfg(not(feature = "v4l"))]
pub fn list_cameras() -> Vec<(String, String)> {
    tracing::info!("built without the `v4l` feature; camera enumeration unavailable");
    Vec::new()
}

/// Cargo features compiled into this binary.
pub fn features() -> Vec<&'static str> {
    let mut out = Vec::new();
    if cfg!(feature = "onnx") {
        out.push("onnx");
    }
    if cfg!(feature = "v4l") {
        out.push("v4l");
    }
    if cfg!(feature = "mic") {
        out.push("mic");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;

    #[test]
    fn test_still_image_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbImage::new(6, 4).save(&path).unwrap();
        let config = Config::resolve(Overrides::default(), dir.path().join("eduscan.toml"));

        let mut source = open_source(&config, Some(&path)).unwrap();
        let frame = source.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
    }

    #[test]
    fn test_missing_image_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::resolve(Overrides::default(), dir.path().join("eduscan.toml"));
        let missing = dir.path().join("none.png");
        assert!(open_source(&config, Some(&missing)).is_err());
    }
}
