//! Error types for drawing generation.

use std::time::Duration;

/// Shown when a generation fails without any usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Blueprint generation failed. Please try again.";

/// Errors that can occur while talking to the image model.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Request could not be built from the given inputs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed base64 or data URI.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (reading the source image, writing an export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    /// Message to put in front of the user.
    pub fn user_message(&self) -> String {
        user_message(self)
    }
}

/// Converts any error into the single line shown in the error panel,
/// falling back to a generic message when the error has no text.
pub fn user_message(err: &dyn std::fmt::Display) -> String {
    let message = err.to_string();
    let message = message.trim();
    if message.is_empty() {
        GENERIC_FAILURE_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl std::fmt::Display for Silent {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "   ")
        }
    }

    #[test]
    fn test_error_display() {
        let err = GenerationError::Api {
            status: 400,
            message: "Bad image".into(),
        };
        assert_eq!(err.to_string(), "API error: 400 - Bad image");

        let err = GenerationError::Auth("GEMINI_API_KEY not set".into());
        assert_eq!(err.to_string(), "authentication failed: GEMINI_API_KEY not set");
    }

    #[test]
    fn test_user_message_uses_error_text() {
        let err = GenerationError::InvalidRequest("no image".into());
        assert_eq!(err.user_message(), "invalid request: no image");
    }

    #[test]
    fn test_user_message_falls_back_when_blank() {
        assert_eq!(user_message(&Silent), GENERIC_FAILURE_MESSAGE);
    }
}
