//! eduscan-core — Student galleries and biometric matching.
//!
//! Face and voice embeddings are produced by pluggable encoders
//! ([`FaceEncoder`], [`VoiceEncoder`]). With the `onnx` feature, SCRFD +
//! ArcFace face encoding and a waveform speaker encoder run via ONNX Runtime.

pub mod encoder;
pub mod gallery;
pub mod types;
pub mod voice;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use encoder::{EncoderError, FaceEncoder};
pub use gallery::{Gallery, GalleryError, MatchResult, Matcher, NearestMatcher};
pub use types::{BoundingBox, Embedding, FaceEncoding, StudentRecord};
pub use voice::{VoiceEncoder, VoiceError, VoiceMatcher};
