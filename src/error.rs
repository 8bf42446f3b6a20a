//! Error types for the land-analyzer library.
//!
//! Library code returns [`AnalyzerError`]; the binary and configuration
//! loading wrap these with `anyhow` context.

use thiserror::Error;

/// Errors that can occur while importing, analyzing or serving listing data.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The CSV file is structurally unusable (no header, no address column)
    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),

    /// Rejected user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A geocoder or notification channel failed after retries
    #[error("External service error ({service}): {message}")]
    ExternalService {
        /// Service name, e.g. `telegram` or `nominatim`
        service: String,
        /// Failure detail
        message: String,
    },

    /// Another pipeline run holds the lock
    #[error("Pipeline run already in progress (held by {0})")]
    RunInProgress(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with `AnalyzerError`
pub type Result<T> = std::result::Result<T, AnalyzerError>;

impl From<anyhow::Error> for AnalyzerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

impl AnalyzerError {
    /// Shorthand for an [`AnalyzerError::ExternalService`] error.
    pub fn external(service: &str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            message: message.into(),
        }
    }
}
