//! Flat per-student media directory: `{id}_face.jpg` and `{id}_voice.wav`.

use crate::error::StoreError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct MediaDir {
    root: PathBuf,
}

impl MediaDir {
    /// Use `root` as the media directory, creating it when missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the face photo. Ids that would escape the directory are
    /// refused.
    pub fn face_path(&self, student_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(student_id)?;
        Ok(self.root.join(format!("{student_id}_face.jpg")))
    }

    pub fn voice_path(&self, student_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(student_id)?;
        Ok(self.root.join(format!("{student_id}_voice.wav")))
    }

    /// Store a face photo for `student_id`, re-encoding it as JPEG.
    pub fn import_face(&self, student_id: &str, src: &Path) -> Result<PathBuf, StoreError> {
        let dest = self.face_path(student_id)?;
        let img = image::open(src)?.to_rgb8();
        img.save_with_format(&dest, image::ImageFormat::Jpeg)?;
        tracing::debug!(student_id, path = %dest.display(), "face photo stored");
        Ok(dest)
    }

    /// Copy a WAV voice sample into place for `student_id`.
    pub fn import_voice(&self, student_id: &str, src: &Path) -> Result<PathBuf, StoreError> {
        let dest = self.voice_path(student_id)?;
        if src != dest {
            std::fs::copy(src, &dest)?;
        }
        tracing::debug!(student_id, path = %dest.display(), "voice sample stored");
        Ok(dest)
    }

    /// Delete both media files. Missing files are not an error.
    pub fn remove(&self, student_id: &str) -> Result<(), StoreError> {
        for path in [self.face_path(student_id)?, self.voice_path(student_id)?] {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "media removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Student ids become file names, so path separators are refused.
pub fn validate_id(student_id: &str) -> Result<(), StoreError> {
    let trimmed = student_id.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput("student id is empty".into()));
    }
    if trimmed != student_id {
        return Err(StoreError::InvalidInput(format!(
            "student id has surrounding whitespace: {student_id:?}"
        )));
    }
    if student_id.contains(['/', '\\']) || student_id == "." || student_id == ".." {
        return Err(StoreError::InvalidInput(format!(
            "student id is not a valid file name: {student_id:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_naming_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaDir::open(dir.path()).unwrap();
        let face = media.face_path("S1").unwrap();
        let voice = media.voice_path("S1").unwrap();
        assert_eq!(face, dir.path().join("S1_face.jpg"));
        assert_eq!(voice, dir.path().join("S1_voice.wav"));
    }

    #[test]
    fn test_import_face_reencodes_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaDir::open(dir.path().join("students")).unwrap();
        let src = dir.path().join("photo.png");
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
            .save(&src)
            .unwrap();

        let dest = media.import_face("S1", &src).unwrap();
        let bytes = std::fs::read(&dest).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaDir::open(dir.path()).unwrap();
        let voice = media.voice_path("S1").unwrap();
        std::fs::write(voice, b"RIFF").unwrap();

        media.remove("S1").unwrap();
        assert!(!media.voice_path("S1").unwrap().exists());
        media.remove("S1").unwrap();
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("S1").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id(" S1").is_err());
        assert!(validate_id("../S1").is_err());
    }

    #[test]
    fn test_traversing_ids_never_touch_outside_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaDir::open(dir.path().join("students")).unwrap();
        let outside = dir.path().join("victim_face.jpg");
        std::fs::write(&outside, b"jpeg").unwrap();

        assert!(media.face_path("../victim").is_err());
        assert!(media.voice_path("../victim").is_err());
        assert!(matches!(
            media.remove("../victim"),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(outside.exists());
    }
}
