//! Error types for attache-core

use thiserror::Error;

/// Result type alias using attache-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in attache-core operations.
///
/// Upload failures are deliberately not represented here: a settled upload
/// reports an [`crate::models::UploadOutcome`], terminal to one entry and
/// never fatal to the manager as a whole.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Compose API error
    #[error("Compose API error: {0}")]
    Api(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
