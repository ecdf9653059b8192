//! Error types for the tool bridge
//!
//! Provides unified error handling using thiserror. Every failure a caller can
//! observe ends up as the `{"success": false, "error": ...}` envelope.

use std::io;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::Envelope;

// == Tool Error Enum ==
/// Unified error type for tools, the cache and the proxy router.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Path or cache id absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cache entry outlived its TTL and was evicted on access
    #[error("Cache expired: {id} (age: {age_secs}s)")]
    Expired { id: String, age_secs: u64 },

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Path exists but is not a regular file
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// The OS refused a listing or read
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Content could not be decoded with the requested encoding
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Malformed arguments or configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No tool or backend prefix matches the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// No prompt or backend prefix matches the requested prompt name
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    /// Backend could not be reached (connect, transport or protocol failure)
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    /// Backend answered with a JSON-RPC error
    #[error("Backend error: {0}")]
    BackendRejected(String),

    /// Caller-supplied deadline elapsed
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    // == Contextual I/O Mapping ==
    /// Maps an I/O error onto the taxonomy, naming the path it concerned.
    pub fn from_io(err: io::Error, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        match err.kind() {
            io::ErrorKind::NotFound => ToolError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => ToolError::PermissionDenied(path.to_string()),
            io::ErrorKind::InvalidData => ToolError::DecodeError(format!("{}: {}", path, err)),
            _ => ToolError::Io(format!("{}: {}", path, err)),
        }
    }

    /// HTTP status used when the error is returned from a REST endpoint.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ToolError::NotFound(_)
            | ToolError::Expired { .. }
            | ToolError::UnknownTool(_)
            | ToolError::UnknownPrompt(_) => StatusCode::NOT_FOUND,
            ToolError::NotADirectory(_)
            | ToolError::NotAFile(_)
            | ToolError::DecodeError(_)
            | ToolError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ToolError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ToolError::BackendUnreachable(_) | ToolError::BackendRejected(_) => {
                StatusCode::BAD_GATEWAY
            }
            ToolError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ToolError::Io(_) | ToolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<io::Error> for ToolError {
    fn from(err: io::Error) -> Self {
        ToolError::from_io(err, "<unknown path>")
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidRequest(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(Envelope::failure(&self))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tool bridge.
pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            ToolError::from_io(err, "/tmp/x"),
            ToolError::NotFound(p) if p == "/tmp/x"
        ));
    }

    #[test]
    fn test_io_permission_maps_to_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            ToolError::from_io(err, "/root"),
            ToolError::PermissionDenied(_)
        ));
    }

    #[test]
    fn test_expired_message_contains_age() {
        let err = ToolError::Expired {
            id: "folder_1".to_string(),
            age_secs: 4000,
        };
        assert_eq!(err.to_string(), "Cache expired: folder_1 (age: 4000s)");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_backend_errors_are_bad_gateway() {
        assert_eq!(
            ToolError::BackendUnreachable("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ToolError::Timeout("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
