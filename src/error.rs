//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type. Each variant maps to a
//! stable integer code and an HTTP status, rendered as the canonical
//! envelope:
//!
//! ```json
//! {"error": {"code": 1011, "message": "unknown point of interest"}}
//! ```
//!
//! Raw storage and third-party error strings never reach clients; they
//! are logged with the request context and collapsed into
//! [`GatewayError::InternalServer`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum with stable code and HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or missing request input.
    #[error("invalid parameters")]
    InvalidParameters,

    /// Bearer token missing or not recognized.
    #[error("invalid authentication token")]
    Unauthenticated,

    /// The account exists but may not perform this action.
    #[error("operation is not permitted")]
    Forbidden,

    /// The account has never shared a location.
    #[error("unknown account location")]
    UnknownAccountLocation,

    /// POI not found, or not attached to the requesting account.
    #[error("unknown point of interest")]
    UnknownPoi,

    /// The profile has no POI list to reorder.
    #[error("poi list not found")]
    PoiListNotFound,

    /// A reorder request referenced POIs outside the stored list.
    #[error("poi list mismatch")]
    PoiListMismatch,

    /// A customized resource was submitted with a blank name.
    #[error("empty poi resource name")]
    EmptyPoiResourceName,

    /// An unsupported suggestion variant was requested.
    #[error("resource is not supported")]
    ResourceNotSupport,

    /// Storage, geocoder, or notification failure. The inner string is
    /// logged, never serialized to the client.
    #[error("internal server error")]
    InternalServer(String),
}

impl GatewayError {
    /// Wraps any displayable internal failure.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::InternalServer(err.to_string())
    }

    /// Returns the stable numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InternalServer(_) => 999,
            Self::InvalidParameters => 1000,
            Self::Unauthenticated => 1001,
            Self::Forbidden => 1002,
            Self::UnknownAccountLocation => 1010,
            Self::UnknownPoi => 1011,
            Self::PoiListNotFound => 1012,
            Self::PoiListMismatch => 1013,
            Self::EmptyPoiResourceName => 1014,
            Self::ResourceNotSupport => 1015,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameters
            | Self::UnknownAccountLocation
            | Self::UnknownPoi
            | Self::EmptyPoiResourceName => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PoiListNotFound
            | Self::PoiListMismatch
            | Self::ResourceNotSupport
            | Self::InternalServer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let Self::InternalServer(detail) = &self {
            tracing::error!(detail = %detail, "internal server error");
        }

        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalServer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(GatewayError::InvalidParameters.error_code(), 1000);
        assert_eq!(GatewayError::Unauthenticated.error_code(), 1001);
        assert_eq!(GatewayError::UnknownPoi.error_code(), 1011);
        assert_eq!(GatewayError::internal("boom").error_code(), 999);
    }

    #[test]
    fn status_mapping_is_canonical() {
        assert_eq!(
            GatewayError::InvalidParameters.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::PoiListMismatch.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_message_is_not_leaked() {
        let err = GatewayError::internal("password=hunter2 connection refused");
        assert_eq!(err.to_string(), "internal server error");
    }
}
