//! The frame-source seam and a still-image implementation.

use crate::frame::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy: {0}")]
    DeviceBusy(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("frame source already released")]
    Released,
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Anything the recognition loop can pull frames from.
///
/// The source owns its device exclusively until [`release`](Self::release)
/// is called or it is dropped. Releasing twice is a no-op.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
    fn release(&mut self);
    fn is_open(&self) -> bool;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        (**self).read_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Serves the same decoded image on every read. Used for registration
/// photos and for dry runs without a camera.
pub struct StillImage {
    path: PathBuf,
    frame: Option<Frame>,
    reads: u32,
}

impl StillImage {
    pub fn open(path: &Path) -> Result<Self, CameraError> {
        if !path.exists() {
            return Err(CameraError::DeviceNotFound(path.display().to_string()));
        }
        let img = image::open(path)?.to_rgb8();
        tracing::debug!(
            path = %path.display(),
            width = img.width(),
            height = img.height(),
            "opened still image"
        );
        Ok(Self {
            path: path.to_path_buf(),
            frame: Some(Frame::from_image(img, 0)),
            reads: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StillImage {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let frame = self.frame.as_ref().ok_or(CameraError::Released)?;
        self.reads = self.reads.wrapping_add(1);
        Ok(Frame {
            sequence: self.reads,
            timestamp: std::time::Instant::now(),
            ..frame.clone()
        })
    }

    fn release(&mut self) {
        self.frame = None;
    }

    fn is_open(&self) -> bool {
        self.frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_still_image_repeats_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(4, 3, Rgb([9, 8, 7]))
            .save(&path)
            .unwrap();

        let mut src = StillImage::open(&path).unwrap();
        let a = src.read_frame().unwrap();
        let b = src.read_frame().unwrap();
        assert_eq!((a.width, a.height), (4, 3));
        assert_eq!(a.data, b.data);
        assert_eq!((a.sequence, b.sequence), (1, 2));

        src.release();
        src.release();
        assert!(!src.is_open());
        assert!(matches!(src.read_frame(), Err(CameraError::Released)));
    }

    #[test]
    fn test_still_image_missing_file() {
        let err = StillImage::open(Path::new("/nonexistent/face.jpg"))
            .err()
            .unwrap();
        assert!(matches!(err, CameraError::DeviceNotFound(_)));
    }
}
