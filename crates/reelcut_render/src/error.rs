use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("invalid export settings: {0}")]
    InvalidSettings(String),

    #[error("nothing to export: composition is empty")]
    EmptyComposition,

    #[error("asset not found: {0}")]
    AssetNotFound(uuid::Uuid),

    #[error("renderer failed: {0}")]
    Renderer(String),

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("audio decode failed: {0}")]
    Decode(String),

    #[error("core error: {0}")]
    Core(#[from] reelcut_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Map a spawn failure, telling a missing binary apart from other IO errors.
pub(crate) fn spawn_error(e: std::io::Error) -> RenderError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RenderError::FfmpegNotFound
    } else {
        RenderError::Io(e)
    }
}
