//! Chart quota enforcement
//!
//! `ChartQuota` is an extractor that consumes one chart call from the
//! caller's quota before the handler runs. Denied calls never reach the
//! handler and get a 429 with the plan, its limit and the window reset time.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tally_core::{Plan, QuotaDecision, QuotaLedger};
use tracing::{info, warn};

use super::identity::{identity_from_headers, quota_key_from_headers};
use crate::api::ChartSettings;

/// Body of a 429 chart response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotaExceededResponse {
    error: &'static str,
    plan: Plan,
    limit: u32,
    reset_at: DateTime<Utc>,
}

/// Chart quota rejection
pub enum ChartQuotaRejection {
    /// Charts are switched off
    Disabled,
    /// The caller has used up the window
    Exceeded { plan: Plan, decision: QuotaDecision },
    /// The ledger was not wired into the router
    Misconfigured,
}

impl IntoResponse for ChartQuotaRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Disabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "Feature Disabled" })),
            )
                .into_response(),
            Self::Exceeded { plan, decision } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(QuotaExceededResponse {
                    error: "Rate limit exceeded for chart endpoint",
                    plan,
                    limit: decision.limit,
                    reset_at: decision.reset_at,
                }),
            )
                .into_response(),
            Self::Misconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Chart quota not configured" })),
            )
                .into_response(),
        }
    }
}

/// One consumed chart call
#[derive(Debug)]
pub struct ChartQuota {
    /// Ledger state after this call was counted
    pub decision: QuotaDecision,
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for ChartQuota
where
    S: Send + Sync,
{
    type Rejection = ChartQuotaRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let enabled = parts
            .extensions
            .get::<ChartSettings>()
            .map(|s| s.enabled)
            .unwrap_or(false);
        if !enabled {
            return Err(ChartQuotaRejection::Disabled);
        }

        let ledger = parts
            .extensions
            .get::<Arc<QuotaLedger>>()
            .cloned()
            .ok_or(ChartQuotaRejection::Misconfigured)?;

        let identity = identity_from_headers(&parts.headers);
        let plan = identity.as_ref().map(|i| i.plan).unwrap_or_default();
        let key = quota_key_from_headers(identity.as_ref(), &parts.headers);

        let decision = ledger.consume(&key, plan);
        if !decision.allowed {
            warn!(key = %key, plan = %plan, reset_at = %decision.reset_at, "Chart quota exceeded");
            return Err(ChartQuotaRejection::Exceeded { plan, decision });
        }

        info!(key = %key, plan = %plan, remaining = decision.remaining, "Chart quota consumed");
        Ok(ChartQuota { decision })
    }
}
