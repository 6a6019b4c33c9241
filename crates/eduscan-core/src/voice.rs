//! Voice fallback matching.
//!
//! Verification is closed-set: the candidate student is already
//! hypothesized and only their enrolled sample is compared against the
//! fresh one.

use crate::types::Embedding;
use std::path::Path;
use thiserror::Error;

/// Sample rate voice encoders operate on.
pub const VOICE_SAMPLE_RATE: u32 = 16_000;

/// Default cosine-similarity acceptance threshold.
pub const DEFAULT_VOICE_THRESHOLD: f32 = 0.75;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    #[error("audio sample is empty: {0}")]
    EmptySample(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[cfg(feature = "onnx")]
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces a speaker embedding from a WAV file.
pub trait VoiceEncoder {
    fn embed(&mut self, wav_path: &Path) -> Result<Embedding, VoiceError>;
}

impl<T: VoiceEncoder + ?Sized> VoiceEncoder for Box<T> {
    fn embed(&mut self, wav_path: &Path) -> Result<Embedding, VoiceError> {
        (**self).embed(wav_path)
    }
}

/// Cosine-similarity voice verifier.
pub struct VoiceMatcher<V> {
    encoder: V,
    threshold: f32,
}

impl<V: VoiceEncoder> VoiceMatcher<V> {
    pub fn new(encoder: V, threshold: f32) -> Self {
        Self { encoder, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compare a fresh `sample` with the `enrolled` recording.
    ///
    /// Returns `Ok(false)` when either file is missing; accepts when the
    /// cosine similarity is strictly greater than the threshold.
    pub fn matches(&mut self, enrolled: &Path, sample: &Path) -> Result<bool, VoiceError> {
        if !enrolled.exists() || !sample.exists() {
            tracing::debug!(
                enrolled = %enrolled.display(),
                sample = %sample.display(),
                "voice sample missing"
            );
            return Ok(false);
        }

        let enrolled_embed = self.encoder.embed(enrolled)?;
        let sample_embed = self.encoder.embed(sample)?;
        let similarity = enrolled_embed.similarity(&sample_embed);

        tracing::debug!(similarity, threshold = self.threshold, "voice comparison");
        Ok(similarity > self.threshold)
    }
}

/// Read a WAV file as mono `f32` samples at [`VOICE_SAMPLE_RATE`].
///
/// Channels are averaged; other rates are linearly resampled.
pub fn load_wav_mono(path: &Path) -> Result<Vec<f32>, VoiceError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            reader.samples::<f32>().collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    if mono.is_empty() {
        return Err(VoiceError::EmptySample(path.display().to_string()));
    }

    Ok(resample_linear(&mono, spec.sample_rate, VOICE_SAMPLE_RATE))
}

/// Linear-interpolation resampler, adequate for speaker embeddings.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let i0 = (pos.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let frac = (pos - i0 as f64) as f32;
            samples[i0] * (1.0 - frac) + samples[i1] * frac
        })
        .collect()
}
