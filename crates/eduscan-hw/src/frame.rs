//! RGB frame type and pixel conversions.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::Path;
use std::time::Instant;

/// A captured RGB24 frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB pixels (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn from_image(img: RgbImage, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Average luma (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        let pixels = self.data.len() / 3;
        if pixels == 0 {
            return 0.0;
        }
        self.data.chunks_exact(3).map(luma).sum::<f32>() / pixels as f32
    }

    /// True when nearly every pixel is black (lens covered, camera warming up).
    pub fn is_dark(&self) -> bool {
        is_dark_frame(&self.data, 0.95)
    }

    /// Downscale to fit `max_width` × `max_height`, keeping aspect ratio.
    /// Frames already within bounds are returned unchanged.
    pub fn downscaled(self, max_width: u32, max_height: u32) -> Self {
        if self.width <= max_width && self.height <= max_height {
            return self;
        }
        let scale_w = max_width as f32 / self.width as f32;
        let scale = scale_w.min(max_height as f32 / self.height as f32);
        let new_w = ((self.width as f32 * scale).round() as u32).max(1);
        let new_h = ((self.height as f32 * scale).round() as u32).max(1);

        let Some(img) = RgbImage::from_raw(self.width, self.height, self.data.clone()) else {
            return self;
        };
        let resized = imageops::resize(&img, new_w, new_h, FilterType::Triangle);
        Self {
            data: resized.into_raw(),
            width: new_w,
            height: new_h,
            ..self
        }
    }

    /// Write the frame as an image; the format follows the file extension.
    pub fn save(&self, path: &Path) -> image::ImageResult<()> {
        image::save_buffer(
            path,
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::Rgb8,
        )
    }
}

fn luma(px: &[u8]) -> f32 {
    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
}

/// True if more than `threshold_pct` of RGB pixels have luma below 32.
pub fn is_dark_frame(rgb: &[u8], threshold_pct: f32) -> bool {
    let pixels = rgb.len() / 3;
    if pixels == 0 {
        return true;
    }
    let dark = rgb.chunks_exact(3).filter(|px| luma(px) < 32.0).count();
    (dark as f32 / pixels as f32) > threshold_pct
}

/// Convert packed YUYV 4:2:2 to RGB24 (BT.601, limited range).
///
/// Each 4-byte group `[Y0, U, Y1, V]` yields two pixels sharing chroma.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for group in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (group[1] as f32 - 128.0, group[3] as f32 - 128.0);
        for y in [group[0], group[2]] {
            let c = 1.164 * (y as f32 - 16.0);
            rgb.push((c + 1.596 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((c - 0.392 * u - 0.813 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((c + 2.017 * u).round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, px: [u8; 3]) -> Frame {
        Frame::from_image(RgbImage::from_pixel(width, height, image::Rgb(px)), 0)
    }

    #[test]
    fn test_yuyv_grey_pixels() {
        // Neutral chroma: Y=16 → black, Y=235 → white
        let rgb = yuyv_to_rgb(&[16, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_output_length() {
        let yuyv = vec![128u8; 4 * 2 * 2];
        assert_eq!(yuyv_to_rgb(&yuyv, 4, 2).unwrap().len(), 4 * 2 * 3);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[1, 2], 2, 1).is_err());
    }

    #[test]
    fn test_dark_detection() {
        assert!(solid(10, 10, [0, 0, 0]).is_dark());
        assert!(!solid(10, 10, [120, 120, 120]).is_dark());
        assert!(is_dark_frame(&[], 0.95));
    }

    #[test]
    fn test_avg_brightness_white() {
        let brightness = solid(4, 4, [255, 255, 255]).avg_brightness();
        assert!((brightness - 255.0).abs() < 0.5);
    }

    #[test]
    fn test_downscale_keeps_aspect() {
        let f = solid(640, 480, [10, 20, 30]).downscaled(320, 240);
        assert_eq!((f.width, f.height), (320, 240));
        assert_eq!(f.data.len(), 320 * 240 * 3);
        assert_eq!(&f.data[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_downscale_noop_when_small() {
        let f = solid(100, 50, [1, 2, 3]).downscaled(320, 240);
        assert_eq!((f.width, f.height), (100, 50));
    }

    #[test]
    fn test_save_and_reload_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        solid(8, 6, [200, 100, 50]).save(&path).unwrap();
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (8, 6));
        assert_eq!(back.get_pixel(3, 3).0, [200, 100, 50]);
    }
}
