//! Error types for argo-explorer services.

use thiserror::Error;

/// Result type alias using ArgoError.
pub type ArgoResult<T> = Result<T, ArgoError>;

/// Primary error type shared by the query and ingest services.
#[derive(Debug, Error)]
pub enum ArgoError {
    // === Request errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    // === Data errors ===
    #[error("No data available: {0}")]
    DataNotAvailable(String),

    #[error("Float not found: {0}")]
    FloatNotFound(i32),

    // === Remote source errors ===
    #[error("Data service error: {0}")]
    SourceError(String),

    #[error("Failed to parse source response: {0}")]
    SourceParseError(String),

    // === Storage errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    // === Infrastructure errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ArgoError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ArgoError::MissingParameter(_)
            | ArgoError::InvalidParameter { .. }
            | ArgoError::UnknownRegion(_)
            | ArgoError::InvalidTime(_) => 400,

            ArgoError::DataNotAvailable(_) | ArgoError::FloatNotFound(_) => 404,

            ArgoError::ServiceUnavailable(_) => 503,

            _ => 500,
        }
    }
}

impl From<std::io::Error> for ArgoError {
    fn from(err: std::io::Error) -> Self {
        ArgoError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for ArgoError {
    fn from(err: serde_json::Error) -> Self {
        ArgoError::InternalError(format!("JSON error: {}", err))
    }
}
