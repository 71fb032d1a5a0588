//! Image handed to a viewer
//!
//! The bytes are written to a temp file so an external viewer can open them;
//! the file is removed when the preview is dropped.
//!
//! ## Change history
//! - 2026-10-19: `persist` removed; saving goes through `Session::save_image`

use crate::error::Result;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub struct ImagePreview {
    pub file_name: String,
    /// `None` when the bytes are not a decodable image header
    pub dimensions: Option<(u32, u32)>,
    file: NamedTempFile,
}

impl ImagePreview {
    pub fn new(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let suffix = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("star-preview-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            file_name: file_name.to_string(),
            dimensions: image_dimensions(bytes),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
