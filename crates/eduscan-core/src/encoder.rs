//! Face encoder seam.
//!
//! A [`FaceEncoder`] turns an RGB frame into zero or more
//! [`FaceEncoding`]s (box + embedding). The recognition loop and the
//! registration path only ever see this trait.

use crate::types::{Embedding, FaceEncoding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer has {actual} bytes, expected {expected} for RGB24")]
    InvalidFrame { expected: usize, actual: usize },
    #[error("face has no landmarks; the detector must return landmarks for alignment")]
    NoLandmarks,
    #[error("no face found in image")]
    NoFaceDetected,
    #[cfg(feature = "onnx")]
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Detects faces in an RGB24 frame and embeds each of them.
///
/// Results are ordered by detection confidence, highest first.
pub trait FaceEncoder {
    fn encode(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceEncoding>, EncoderError>;
}

impl<T: FaceEncoder + ?Sized> FaceEncoder for Box<T> {
    fn encode(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceEncoding>, EncoderError> {
        (**self).encode(rgb, width, height)
    }
}

/// Validate that `rgb` holds exactly `width * height` RGB24 pixels.
pub fn check_frame(rgb: &[u8], width: u32, height: u32) -> Result<(), EncoderError> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(EncoderError::InvalidFrame {
            expected,
            actual: rgb.len(),
        });
    }
    Ok(())
}

/// Embedding of the most confident face in a registration photo.
pub fn encode_single<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    rgb: &[u8],
    width: u32,
    height: u32,
) -> Result<Embedding, EncoderError> {
    let faces = encoder.encode(rgb, width, height)?;
    if faces.len() > 1 {
        tracing::warn!(faces = faces.len(), "several faces in photo; using the most confident");
    }
    faces
        .into_iter()
        .next()
        .map(|f| f.embedding)
        .ok_or(EncoderError::NoFaceDetected)
}
