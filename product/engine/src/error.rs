use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no image selected: {0}")]
    Selection(String),

    #[error("could not load image from {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("imgBB upload failed: {0}")]
    Upload(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("visual search failed: {0}")]
    Search(String),

    #[error("a search is already in progress")]
    SessionBusy,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
