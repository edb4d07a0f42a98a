//! Error types shared by every deck-generation component.

use std::time::Duration;

/// Everything that can go wrong while generating a deck or driving a run.
///
/// None of these are retried. The only failure that is absorbed rather than
/// propagated is a failed image for a single slide, which is handled inside
/// [`crate::presentation::PresentationBuilder`].
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// A text, image or run-API call failed or returned nothing usable.
    #[error("remote service error: {0}")]
    RemoteService(String),
    /// A generated image could not be downloaded or decoded.
    #[error("failed to fetch generated image: {0}")]
    Fetch(String),
    /// The remote run asked for a function that is not registered.
    #[error("unknown callback function: '{0}'")]
    UnknownCallback(String),
    #[error("invalid arguments for '{function}': {message}")]
    InvalidArguments { function: String, message: String },
    #[error("invalid deck request: {0}")]
    InvalidRequest(String),
    #[error("missing prompt template: '{0}'")]
    MissingPrompt(String),
    #[error("run {run_id} failed: {reason}")]
    RunFailed { run_id: String, reason: String },
    #[error("run {run_id} did not complete within {budget:?}")]
    Timeout { run_id: String, budget: Duration },
    #[error("polling of run {run_id} was cancelled")]
    Cancelled { run_id: String },
    #[error("failed to write deck: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to package deck: {0}")]
    Package(#[from] zip::result::ZipError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<async_openai::error::OpenAIError> for DeckError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Self::RemoteService(err.to_string())
    }
}

impl From<reqwest::Error> for DeckError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

impl From<image::ImageError> for DeckError {
    fn from(err: image::ImageError) -> Self {
        Self::Fetch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeckError::UnknownCallback("delete_everything".to_string());
        assert_eq!(
            err.to_string(),
            "unknown callback function: 'delete_everything'"
        );

        let err = DeckError::InvalidArguments {
            function: "create_presentation".to_string(),
            message: "missing field `topic`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid arguments for 'create_presentation': missing field `topic`"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: DeckError = io.into();
        assert!(matches!(err, DeckError::Io(_)));
    }
}
