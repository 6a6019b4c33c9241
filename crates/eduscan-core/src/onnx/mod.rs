//! ONNX Runtime backends: SCRFD detection, ArcFace embedding, speaker
//! embedding.

pub mod alignment;
pub mod detector;
pub mod recognizer;
pub mod speaker;

pub use detector::ScrfdDetector;
pub use recognizer::ArcFaceRecognizer;
pub use speaker::OnnxVoiceEncoder;

use crate::encoder::{check_frame, EncoderError, FaceEncoder};
use crate::types::FaceEncoding;
use image::RgbImage;
use std::path::Path;

/// File names expected inside the model directory.
pub const DETECTOR_MODEL: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL: &str = "w600k_r50.onnx";
pub const SPEAKER_MODEL: &str = "speaker.onnx";

/// SCRFD + ArcFace pipeline behind the [`FaceEncoder`] seam.
pub struct OnnxFaceEncoder {
    detector: ScrfdDetector,
    recognizer: ArcFaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncoderError> {
        let detector = ScrfdDetector::load(&model_dir.join(DETECTOR_MODEL))?;
        let recognizer = ArcFaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL))?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceEncoding>, EncoderError> {
        check_frame(rgb, width, height)?;
        let faces = self.detector.detect(rgb, width, height)?;
        if faces.is_empty() {
            return Ok(Vec::new());
        }

        let frame =
            RgbImage::from_raw(width, height, rgb.to_vec()).ok_or(EncoderError::InvalidFrame {
                expected: width as usize * height as usize * 3,
                actual: rgb.len(),
            })?;

        let mut encodings = Vec::with_capacity(faces.len());
        for face in faces {
            match self.recognizer.extract(&frame, &face) {
                Ok(embedding) => encodings.push(FaceEncoding { face, embedding }),
                Err(EncoderError::NoLandmarks) => {
                    tracing::debug!(
                        confidence = face.confidence,
                        "skipping face without landmarks"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(encodings)
    }
}
