use thiserror::Error;

#[derive(Error, Debug)]
pub enum TracemarkError {
    #[error("Image load error: {0}")]
    ImageLoad(String),

    #[error("Image encode error: {0}")]
    ImageEncode(String),

    #[error("Image too small to watermark: {width}x{height}, need at least {min}x{min}")]
    ImageTooSmall { width: u32, height: u32, min: usize },

    #[error("Watermark not recoverable from this image: {0}")]
    Unrecoverable(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<serde_json::Error> for TracemarkError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TracemarkError>;
