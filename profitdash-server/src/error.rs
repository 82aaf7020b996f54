//! HTTP error responses.
//!
//! Every failure leaves the server as `{"error": "<message>", "code": "<CODE>"}`
//! with a status derived from the library error.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use profitdash::ProfitdashError;
use serde::Serialize;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
}

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Error raised by the library.
    Domain(ProfitdashError),
    /// Request body, query or path could not be parsed.
    BadRequest(String),
}

impl ApiError {
    /// Status code of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        let Self::Domain(error) = self else {
            return StatusCode::BAD_REQUEST;
        };
        match error {
            ProfitdashError::Validation(_) | ProfitdashError::InvalidPlanCode(_) => {
                StatusCode::BAD_REQUEST
            }
            ProfitdashError::InvalidTransition(_) | ProfitdashError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            ProfitdashError::NotFound(_) => StatusCode::NOT_FOUND,
            ProfitdashError::ReadOnly(_)
            | ProfitdashError::LimitReached(_)
            | ProfitdashError::Forbidden(_) => StatusCode::FORBIDDEN,
            ProfitdashError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ProfitdashError::Config(_) | ProfitdashError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProfitdashError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable code of the response.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Domain(error) => error.code(),
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl From<ProfitdashError> for ApiError {
    fn from(error: ProfitdashError) -> Self {
        Self::Domain(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain(error) => write!(f, "{error}"),
            Self::BadRequest(message) => write!(f, "Bad request: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            match &self {
                Self::Domain(ProfitdashError::StoreUnavailable(_)) => {
                    "Service temporarily unavailable".to_owned()
                }
                _ => "Internal server error".to_owned(),
            }
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
            self.to_string()
        };

        let body = Json(ErrorResponse { error: message, code: self.code().to_owned() });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ProfitdashError::Validation(String::new()), StatusCode::BAD_REQUEST),
            (ProfitdashError::InvalidPlanCode(String::new()), StatusCode::BAD_REQUEST),
            (ProfitdashError::InvalidTransition(String::new()), StatusCode::CONFLICT),
            (ProfitdashError::NotFound(String::new()), StatusCode::NOT_FOUND),
            (ProfitdashError::Conflict(String::new()), StatusCode::CONFLICT),
            (ProfitdashError::ReadOnly(String::new()), StatusCode::FORBIDDEN),
            (ProfitdashError::LimitReached(String::new()), StatusCode::FORBIDDEN),
            (ProfitdashError::Unauthorized(String::new()), StatusCode::UNAUTHORIZED),
            (ProfitdashError::Forbidden(String::new()), StatusCode::FORBIDDEN),
            (ProfitdashError::Config(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
            (ProfitdashError::Storage(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
            (ProfitdashError::StoreUnavailable(String::new()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse { error: "Not found: note".into(), code: "NOT_FOUND".into() };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"error":"Not found: note","code":"NOT_FOUND"}"#);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let response =
            ApiError::from(ProfitdashError::Storage("disk path /var/db".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
