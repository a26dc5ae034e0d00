use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Preview generation failed: {0}")]
    Preview(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown upload category: {0}")]
    UnknownCategory(String),

    #[error("Upload failed: {reason}")]
    Transfer { reason: String },

    #[error("Upload timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Custom result type
pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn preview(message: impl Into<String>) -> Self {
        Self::Preview(message.into())
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::MissingParameter(name.to_string())
    }

    pub fn transfer(reason: impl Into<String>) -> Self {
        Self::Transfer {
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UploadError::Timeout { .. })
    }

    /// Errors raised before any task is created, synchronously to the caller.
    pub fn is_pre_task(&self) -> bool {
        matches!(
            self,
            UploadError::Validation { .. }
                | UploadError::Preview(_)
                | UploadError::MissingParameter(_)
                | UploadError::UnknownCategory(_)
        )
    }
}
