use thiserror::Error;

/// Application-wide error types for the calendar pipeline.
///
/// `Clone` so that a single in-flight acquisition can hand the same failure
/// to every caller sharing it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// HTTP request completed with a non-success status, or failed mid-flight.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request or acquisition timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The rendering surface failed to load the page or run a probe.
    #[error("Render error: {0}")]
    RenderError(String),

    /// A message coming back from the rendering surface could not be decoded.
    #[error("Message error: {0}")]
    MessageError(String),

    /// Persistent key-value store read/write failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::SerializationError(e.to_string())
    }
}
