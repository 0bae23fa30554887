//! Budget endpoints
//!
//! CRUD under `/v1/budgets` plus the status route. Unknown or malformed ids
//! are reported as 404.

use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_core::budget::validate_limit;
use tally_core::{Budget, BudgetId, BudgetStatus, BudgetStore, NewBudget, StatusResolver};
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::middleware::identity::RequireIdentity;

/// Parse a path id; anything that is not a budget id cannot exist
pub(crate) fn parse_budget_id(raw: &str) -> ApiResult<BudgetId> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("budget {}", raw)))
}

/// Response for GET /v1/budgets/group/{groupId}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBudgetsResponse {
    pub group_id: String,
    pub budgets: Vec<Budget>,
    pub count: usize,
}

/// Body of PUT /v1/budgets/{id}; only the limit can change
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBudgetRequest {
    #[serde(default)]
    pub limit_amount: Option<f64>,
}

/// Generic acknowledgement
#[derive(Debug, Serialize)]
pub struct StatusAck {
    pub status: &'static str,
}

async fn create_budget(
    RequireIdentity(identity): RequireIdentity,
    Extension(store): Extension<Arc<dyn BudgetStore>>,
    body: Result<Json<NewBudget>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Budget>)> {
    let Json(draft) = body?;
    let budget = Budget::new(draft, identity.identity_id)?;
    store.insert(&budget).await?;

    info!(budget_id = %budget.id, group_id = %budget.group_id, owner = %budget.owner_id, "Budget created");
    Ok((StatusCode::CREATED, Json(budget)))
}

async fn list_budgets(
    Extension(store): Extension<Arc<dyn BudgetStore>>,
) -> ApiResult<Json<Vec<Budget>>> {
    Ok(Json(store.list_all().await?))
}

async fn list_group_budgets(
    Path(group_id): Path<String>,
    Extension(store): Extension<Arc<dyn BudgetStore>>,
) -> ApiResult<Json<GroupBudgetsResponse>> {
    let budgets = store.list_by_group(&group_id).await?;
    Ok(Json(GroupBudgetsResponse {
        count: budgets.len(),
        group_id,
        budgets,
    }))
}

async fn update_budget(
    Path(id): Path<String>,
    Extension(store): Extension<Arc<dyn BudgetStore>>,
    body: Result<Json<UpdateBudgetRequest>, JsonRejection>,
) -> ApiResult<Json<Budget>> {
    let id = parse_budget_id(&id)?;
    let Json(update) = body?;
    let limit = update
        .limit_amount
        .ok_or_else(|| ApiError::validation("No valid fields to update"))?;
    validate_limit(limit)?;

    let budget = store
        .update_limit(&id, limit)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("budget {}", id)))?;

    info!(budget_id = %id, limit = limit, "Budget limit updated");
    Ok(Json(budget))
}

async fn delete_budget(
    Path(id): Path<String>,
    Extension(store): Extension<Arc<dyn BudgetStore>>,
) -> ApiResult<Json<StatusAck>> {
    let id = parse_budget_id(&id)?;
    if !store.delete(&id).await? {
        return Err(ApiError::not_found(format!("budget {}", id)));
    }

    info!(budget_id = %id, "Budget deleted");
    Ok(Json(StatusAck { status: "ok" }))
}

async fn budget_status(
    Path(id): Path<String>,
    Extension(resolver): Extension<Arc<StatusResolver>>,
) -> ApiResult<Json<BudgetStatus>> {
    let id = parse_budget_id(&id)?;
    Ok(Json(resolver.get_status(&id).await?))
}

/// Create budget routes
pub fn budgets_routes() -> Router {
    Router::new()
        .route("/v1/budgets", get(list_budgets).post(create_budget))
        .route("/v1/budgets/group/:group_id", get(list_group_budgets))
        .route(
            "/v1/budgets/:id",
            axum::routing::put(update_budget).delete(delete_budget),
        )
        .route("/v1/budgets/:id/status", get(budget_status))
}
