use crate::{EngineError, Result};
use image::ImageReader;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "gif"];

#[derive(Debug, Clone, Serialize)]
pub struct SelectedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Validates the user's pick: a path must be present and must decode as an
/// image. Only the header is decoded; the upload sends the original bytes.
pub fn select_image(path: Option<&Path>) -> Result<SelectedImage> {
    let Some(path) = path else {
        return Err(EngineError::Selection("no image file was chosen".to_string()));
    };
    if path.as_os_str().is_empty() {
        return Err(EngineError::Selection("image path is empty".to_string()));
    }
    if !path.is_file() {
        return Err(EngineError::Selection(format!(
            "not a file: {}",
            path.to_string_lossy()
        )));
    }

    let decode_err = |message: String| EngineError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let reader = ImageReader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?;
    if reader.format().is_none() {
        return Err(decode_err("unrecognized image format".to_string()));
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| decode_err(e.to_string()))?;
    let bytes = std::fs::metadata(path)?.len();

    Ok(SelectedImage {
        path: path.to_path_buf(),
        width,
        height,
        bytes,
    })
}
