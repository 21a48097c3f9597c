//! Firestore error types.

use thiserror::Error;

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Errors that can occur during Firestore operations.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Map an HTTP error status to the matching error variant.
    ///
    /// The message should carry whatever detail the server provided.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            429 => Self::RateLimited(message),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// HTTP status corresponding to this error, if it came from one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::RateLimited(_) => Some(429),
            Self::ServerError(status, _) => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status_404() {
        let err = FirestoreError::from_http_status(404, "not found");
        assert!(matches!(err, FirestoreError::NotFound(_)));
        assert_eq!(err.http_status(), Some(404));
    }

    #[test]
    fn test_from_http_status_403() {
        let err = FirestoreError::from_http_status(403, "permission denied");
        assert!(matches!(err, FirestoreError::PermissionDenied(_)));
    }

    #[test]
    fn test_from_http_status_409() {
        let err = FirestoreError::from_http_status(409, "conflict");
        assert!(matches!(err, FirestoreError::AlreadyExists(_)));
    }

    #[test]
    fn test_from_http_status_429() {
        let err = FirestoreError::from_http_status(429, "rate limited");
        assert!(matches!(err, FirestoreError::RateLimited(_)));
    }

    #[test]
    fn test_from_http_status_500() {
        let err = FirestoreError::from_http_status(500, "internal error");
        assert!(matches!(err, FirestoreError::ServerError(500, _)));
        assert_eq!(err.http_status(), Some(500));
    }

    #[test]
    fn test_from_http_status_400() {
        let err = FirestoreError::from_http_status(400, "bad request");
        assert!(matches!(err, FirestoreError::RequestFailed(_)));
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn test_error_message_carries_detail() {
        let err = FirestoreError::from_http_status(404, "no document to update");
        assert!(err.to_string().contains("no document to update"));
    }
}
