//! Error types for Pulse

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Generation error: {0}")]
    Generation(String),

    /// The generator refused the request itself (bad key, unknown model)
    #[error("Generation rejected: {0}")]
    Rejected(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether a failed generation attempt is worth retrying
    ///
    /// Transport failures, timeouts and unusable replies are transient;
    /// configuration mistakes and rejected requests are not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
