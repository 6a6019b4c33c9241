//! Waveform speaker encoder.
//!
//! Expects a model taking `[1, samples]` mono 16 kHz audio and returning a
//! single speaker embedding.

use crate::types::Embedding;
use crate::voice::{load_wav_mono, VoiceEncoder, VoiceError};
use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

pub struct OnnxVoiceEncoder {
    session: Session,
}

impl OnnxVoiceEncoder {
    pub fn load(model_path: &Path) -> Result<Self, VoiceError> {
        if !model_path.exists() {
            return Err(VoiceError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }
        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded speaker encoder");
        Ok(Self { session })
    }
}

impl VoiceEncoder for OnnxVoiceEncoder {
    fn embed(&mut self, wav_path: &Path) -> Result<Embedding, VoiceError> {
        let samples = load_wav_mono(wav_path)?;
        let len = samples.len();
        let input = Array2::from_shape_vec((1, len), samples)
            .map_err(|e| VoiceError::InferenceFailed(format!("input shape: {e}")))?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            VoiceError::InferenceFailed(format!("speaker embedding: {e}"))
        })?;

        if raw.is_empty() {
            return Err(VoiceError::InferenceFailed(
                "empty speaker embedding".into(),
            ));
        }
        Ok(Embedding::new(raw.to_vec()).normalized())
    }
}
