//! Microphone capture via `cpal`.
//!
//! [`Microphone::record_wav`] records a fixed-length clip from the default
//! input device and stores it as a mono WAV file.

use crate::wav;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no input device found on the default audio host")]
    NoDevice,
    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
    #[error("no audio captured")]
    Silent,
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
}

/// Default input device handle.
pub struct Microphone {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

impl Microphone {
    pub fn open_default() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoDevice)?;
        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    /// Record `duration` of audio into a mono WAV at the device's native rate.
    pub fn record_wav(&self, path: &Path, duration: Duration) -> Result<(), AudioError> {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let on_error = |err: cpal::StreamError| {
            tracing::warn!(error = %err, "microphone stream error");
        };

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => {
                let tx = tx.clone();
                self.device.build_input_stream(
                    &self.config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let _ = tx.send(data.to_vec());
                    },
                    on_error,
                    None,
                )?
            }
            cpal::SampleFormat::I16 => {
                let tx = tx.clone();
                self.device.build_input_stream(
                    &self.config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let samples = data.iter().map(|s| *s as f32 / i16::MAX as f32);
                        let _ = tx.send(samples.collect());
                    },
                    on_error,
                    None,
                )?
            }
            cpal::SampleFormat::U16 => {
                let tx = tx.clone();
                self.device.build_input_stream(
                    &self.config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        let samples = data.iter().map(|s| (*s as f32 - 32768.0) / 32768.0);
                        let _ = tx.send(samples.collect());
                    },
                    on_error,
                    None,
                )?
            }
            other => return Err(AudioError::UnsupportedFormat(other)),
        };
        drop(tx);

        stream.play()?;
        std::thread::sleep(duration);
        drop(stream);

        let interleaved: Vec<f32> = rx.try_iter().flatten().collect();
        if interleaved.is_empty() {
            return Err(AudioError::Silent);
        }

        let mono = wav::downmix(&interleaved, self.config.channels);
        wav::write_mono_wav(path, &mono, self.config.sample_rate.0)?;
        tracing::debug!(path = %path.display(), samples = mono.len(), "voice sample recorded");
        Ok(())
    }
}
