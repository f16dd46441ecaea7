//! Query error types.
//!
//! Malformed requests and requests over a cost guard are errors. Unknown
//! events and empty matches are successful empty results, and limit
//! truncation is reported as [`crate::limits::ResourceLimitExceeded`]
//! metadata.

use thiserror::Error;

use crate::coordinates::CoordinateParseError;
use crate::limits::ResourceLimitExceeded;
use crate::responses::ExceptionResponse;

/// Errors that reject a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed path segments.
    #[error("Bad path: {0}")]
    BadPath(String),

    /// Non-numeric or out-of-range value for a directive.
    #[error("Invalid value '{value}' for argument '{key}': {reason}")]
    InvalidArgumentValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Unparsable `ra`/`dec`.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordinateParseError),

    /// The request would cover too many events for what it asks for.
    #[error("Query too expensive: {0}")]
    TooExpensive(ResourceLimitExceeded),

    /// No catalog snapshot has been loaded yet.
    #[error("Catalog snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

impl QueryError {
    /// Shorthand for [`QueryError::InvalidArgumentValue`].
    pub fn invalid_argument(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        QueryError::InvalidArgumentValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::BadPath(_) => 400,
            QueryError::InvalidArgumentValue { .. } => 400,
            QueryError::InvalidCoordinate(_) => 400,
            QueryError::TooExpensive(_) => 400,
            QueryError::SnapshotUnavailable(_) => 503,
        }
    }

    /// Convert to an ExceptionResponse.
    pub fn to_exception(&self) -> ExceptionResponse {
        match self {
            QueryError::BadPath(_) => ExceptionResponse::bad_request("bad-path", self.to_string()),
            QueryError::InvalidArgumentValue { .. } => {
                ExceptionResponse::bad_request("invalid-argument-value", self.to_string())
            }
            QueryError::InvalidCoordinate(_) => {
                ExceptionResponse::bad_request("invalid-coordinate", self.to_string())
            }
            QueryError::TooExpensive(_) => {
                ExceptionResponse::bad_request("too-expensive", self.to_string())
            }
            QueryError::SnapshotUnavailable(_) => {
                ExceptionResponse::service_unavailable(self.to_string())
            }
        }
    }
}
