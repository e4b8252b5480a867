/*!
 * Error types for the ocrsub application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to an annotation provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The long-running annotation operation finished with an error
    #[error("Annotation operation failed: {code} - {message}")]
    OperationFailed {
        /// google.rpc status code
        code: i32,
        /// Error message from the operation
        message: String,
    },

    /// The operation did not complete within the polling budget
    #[error("Annotation operation timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Whether the failure is transient and the request may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// Errors that can occur while configuring or running subtitle synthesis
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The configured text pattern is not a valid regular expression
    #[error("Invalid text pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Why it failed to compile
        reason: String,
    },

    /// Threshold or gap tolerance out of range
    #[error("Invalid synthesis settings: {0}")]
    InvalidSettings(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from an annotation provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle synthesis
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// A video could not be turned into subtitles
    #[error("Processing failed for {input}: {reason}")]
    ProcessingFailed {
        /// Video path or URI
        input: String,
        /// Underlying cause
        reason: String,
    },
}

impl AppError {
    /// Attach the failing video to an underlying cause
    pub fn processing_failed(input: impl Into<String>, cause: &anyhow::Error) -> Self {
        Self::ProcessingFailed {
            input: input.into(),
            reason: format!("{:#}", cause),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
