//! API Error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::chain::ChainError;
use crate::crypto::CryptoError;
use crate::error::ErrorKind;
use crate::payload::PayloadError;
use crate::storage::StorageError;
use crate::validator::ValidationError;

/// Message served for internal failures; the cause is only logged.
const INTERNAL_MESSAGE: &str = "internal error";

/// API error types.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or missing request input.
    #[error("{0}")]
    Param(String),

    /// Requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Chain engine failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Payload building failure.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Key or signature failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Param(_) => ErrorKind::Param,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Chain(e) => e.kind(),
            Self::Validation(e) => e.kind(),
            Self::Payload(e) => e.kind(),
            Self::Crypto(e) => e.kind(),
            Self::Storage(e) => e.kind(),
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Param
            | ErrorKind::UnsupportedPlatform
            | ErrorKind::IdentityMismatch
            | ErrorKind::InvalidSignature
            | ErrorKind::ChainLinkNotFound => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ChainConflict => StatusCode::CONFLICT,
            ErrorKind::ExternalUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub message: String,
    /// Stable error code.
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = if kind == ErrorKind::Storage {
            error!("Request failed: {}", self);
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            message,
            code: kind.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Param("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Chain(ChainError::LinkNotFound("QQ==".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Storage(StorageError::Conflict {
                persona: "02aa".into(),
                head: Some(2),
                declared: Some(1)
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Validation(ValidationError::ExternalUnavailable("timeout".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Storage(StorageError::Backend("disk".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_length_error_message_kept() {
        let err = ApiError::Crypto(CryptoError::SignatureLength {
            expected: 65,
            actual: 64,
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "signature length error: expect 65, got 64");
    }
}
