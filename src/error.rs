//! Error handling and custom error types
//!
//! Provides unified error handling across the adapters and the transcoder using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("File read error: {0}")]
    Read(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Quality must be within [0, 1], got {0}")]
    InvalidQuality(f32),

    /// Message shown to the user as-is by the host.
    #[error("{0}")]
    Upload(String),

    #[error("An upload is already in progress on this adapter")]
    UploadInProgress,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
