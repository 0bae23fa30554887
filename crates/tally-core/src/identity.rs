//! Caller identity
//!
//! Tokens arrive already verified by the API gateway in front of the
//! service, so only the payload segment is decoded here. Signatures are not
//! checked.

use crate::quota::Plan;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identity used when a token carries no subject
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Quota key shared by callers with no identity and no client address
pub const UNKNOWN_QUOTA_KEY: &str = "unknown";

/// Client address headers consulted, in order, for unauthenticated callers
pub const CLIENT_ADDRESS_HEADERS: [&str; 5] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "x-client-ip",
    "x-cluster-client-ip",
];

/// Identity and plan of the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    /// User id from the token
    pub identity_id: String,
    /// Subscription plan from the token
    pub plan: Plan,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    sub: Option<String>,
    user_id: Option<String>,
    plan: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Decode an `Authorization` header value.
///
/// Returns `None` for anything other than `Bearer <jwt>` with a JSON payload.
#[must_use]
pub fn decode_bearer(header_value: &str) -> Option<IdentityContext> {
    let token = header_value.strip_prefix("Bearer ")?.trim();

    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);

    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Bearer payload is not base64url");
            return None;
        }
    };
    let claims: Claims = match serde_json::from_slice(&bytes) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Bearer payload is not a claims object");
            return None;
        }
    };

    let identity_id = non_empty(claims.sub)
        .or_else(|| non_empty(claims.user_id))
        .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string());
    let plan = non_empty(claims.plan)
        .map(|p| Plan::parse(&p))
        .unwrap_or_default();

    Some(IdentityContext { identity_id, plan })
}

/// Key under which a caller's quota is counted.
///
/// Falls back from the identity to the first non-empty client address
/// header, and finally to a single shared `unknown` bucket.
pub fn resolve_quota_key<F>(identity: Option<&IdentityContext>, header: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(identity) = identity {
        return identity.identity_id.clone();
    }

    CLIENT_ADDRESS_HEADERS
        .iter()
        .find_map(|name| header(name).filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| UNKNOWN_QUOTA_KEY.to_string())
}
