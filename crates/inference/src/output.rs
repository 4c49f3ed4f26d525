use crate::error::DetectionError;
use image::{ImageFormat, RgbImage};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

/// The annotated image of the most recent detection, kept at a fixed path.
///
/// Every write replaces the file through a temporary sibling and a rename,
/// so readers see either the previous or the new image, never a partial
/// one. Concurrent writers race and the last rename wins.
#[derive(Debug, Clone)]
pub struct OutputStore {
    path: PathBuf,
}

impl OutputStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Encode `image` as PNG and atomically replace the stored artifact.
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    pub fn write(&self, image: &RgbImage) -> Result<(), DetectionError> {
        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| DetectionError::Output(e.into()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| DetectionError::Output(e.into()))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| DetectionError::Output(e.into()))?;
        tmp.write_all(encoded.get_ref())
            .map_err(|e| DetectionError::Output(e.into()))?;
        tmp.persist(&self.path)
            .map_err(|e| DetectionError::Output(e.error.into()))?;

        tracing::debug!(bytes = encoded.get_ref().len(), "Output image written");
        Ok(())
    }

    /// Current artifact bytes, or `NotFound` if nothing was written yet.
    pub fn read(&self) -> Result<Vec<u8>, DetectionError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(DetectionError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
