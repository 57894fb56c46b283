use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Media error: {0}")]
    Media(String),

    #[error("mpv IPC error: {0}")]
    Ipc(String),

    #[error("Player is not running")]
    NotRunning,

    #[error("Core error: {0}")]
    Core(#[from] reelcut_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
