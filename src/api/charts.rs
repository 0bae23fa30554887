//! Chart endpoints
//!
//! - `GET /v1/budgets/{id}/chart` - pie chart URL of the group's spend, quota-gated
//! - `GET /v1/quota/chart` - the caller's chart quota, without consuming it

use axum::{
    extract::Path,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tally_core::{chart_url, BudgetStore, Plan, QuotaLedger, StatusResolver};

use super::budgets::parse_budget_id;
use super::error::{ApiError, ApiResult};
use crate::middleware::chart_quota::ChartQuota;
use crate::middleware::identity::{quota_key_from_headers, MaybeIdentity};

/// Chart feature switch, shared through an `Extension`
#[derive(Debug, Clone, Copy)]
pub struct ChartSettings {
    pub enabled: bool,
}

/// Response for GET /v1/budgets/{id}/chart
#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub url: String,
}

/// Response for GET /v1/quota/chart
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartQuotaResponse {
    pub plan: Plan,
    pub limit: u32,
    pub remaining: u32,
    pub allowed: bool,
    pub reset_at: DateTime<Utc>,
}

async fn budget_chart(
    quota: ChartQuota,
    Path(id): Path<String>,
    Extension(store): Extension<Arc<dyn BudgetStore>>,
    Extension(resolver): Extension<Arc<StatusResolver>>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_budget_id(&id)?;
    let budget = store
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("budget {}", id)))?;

    let snapshot = resolver.spend_cache().get_snapshot(&budget.group_id).await;
    Ok((
        [
            ("X-RateLimit-Limit", quota.decision.limit.to_string()),
            ("X-RateLimit-Remaining", quota.decision.remaining.to_string()),
        ],
        Json(ChartResponse {
            url: chart_url(&snapshot.by_category),
        }),
    ))
}

async fn chart_quota(
    MaybeIdentity(identity): MaybeIdentity,
    headers: HeaderMap,
    Extension(ledger): Extension<Arc<QuotaLedger>>,
) -> Json<ChartQuotaResponse> {
    let plan = identity.as_ref().map(|i| i.plan).unwrap_or_default();
    let key = quota_key_from_headers(identity.as_ref(), &headers);
    let decision = ledger.peek(&key, plan);

    Json(ChartQuotaResponse {
        plan,
        limit: decision.limit,
        remaining: decision.remaining,
        allowed: decision.allowed,
        reset_at: decision.reset_at,
    })
}

/// Create chart routes
pub fn charts_routes() -> Router {
    Router::new()
        .route("/v1/budgets/:id/chart", get(budget_chart))
        .route("/v1/quota/chart", get(chart_quota))
}
