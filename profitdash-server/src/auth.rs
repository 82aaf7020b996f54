//! Request extractors for bearer authentication and correlation IDs.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use profitdash::{
    ProfitdashError, audit,
    security::{AuditEventType, Caller},
};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Header carrying the request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request correlation ID: the `x-request-id` header when it is a UUID,
/// otherwise a fresh v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

impl RequestId {
    fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .unwrap_or_else(Uuid::new_v4);
        Self(id)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Authenticated caller from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Caller);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let request_id = RequestId::from_headers(&parts.headers).0;
        match authenticate(&parts.headers, state) {
            Ok(caller) => Ok(Self(caller)),
            Err(e) => {
                audit!(
                    AuditEventType::AuthenticationFailed,
                    "anonymous",
                    request_id,
                    with_error(e.to_string()),
                );
                Err(e.into())
            }
        }
    }
}

fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Caller, ProfitdashError> {
    let Some(verifier) = &state.verifier else {
        return Err(ProfitdashError::Unauthorized("token verification is not configured".into()));
    };
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ProfitdashError::Unauthorized("missing bearer token".into()))?
        .to_str()
        .map_err(|_| ProfitdashError::Unauthorized("malformed authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ProfitdashError::Unauthorized("expected a bearer token".into()))?;
    verifier.verify(token, Utc::now())
}
