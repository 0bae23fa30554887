//! Identity extractors for Axum
//!
//! Tokens are verified by the API gateway before requests reach the
//! service, so these extractors only decode the payload.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use tally_core::{decode_bearer, resolve_quota_key, IdentityContext};

/// JSON error response for identity failures
#[derive(Debug, Serialize)]
struct IdentityErrorResponse {
    error: String,
}

/// Identity rejection type
pub struct IdentityRejection {
    status: StatusCode,
    body: IdentityErrorResponse,
}

impl IdentityRejection {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: IdentityErrorResponse {
                error: "Unauthorized: missing or invalid bearer token".to_string(),
            },
        }
    }
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Decode the caller identity from the `Authorization` header
pub fn identity_from_headers(headers: &HeaderMap) -> Option<IdentityContext> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_bearer)
}

/// Quota key for a request: identity, then client address headers, then `unknown`
pub fn quota_key_from_headers(identity: Option<&IdentityContext>, headers: &HeaderMap) -> String {
    resolve_quota_key(identity, |name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

// ============================================================================
// Extractors
// ============================================================================

/// Optional caller identity; never rejects
pub struct MaybeIdentity(pub Option<IdentityContext>);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(identity_from_headers(&parts.headers)))
    }
}

/// Caller identity; rejects with 401 when the token is missing or unreadable
pub struct RequireIdentity(pub IdentityContext);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers)
            .map(RequireIdentity)
            .ok_or_else(IdentityRejection::unauthorized)
    }
}
