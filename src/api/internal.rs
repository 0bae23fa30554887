//! Internal endpoints called by other services
//!
//! `DELETE /v1/internal/users/{userId}` removes every budget a user owns as
//! part of account deletion. It succeeds with a zero count when there is
//! nothing to remove.

use axum::{extract::Path, routing::delete, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tally_core::BudgetStore;
use tracing::info;

use super::error::ApiResult;

/// Response for the user cleanup call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCleanupResponse {
    pub status: &'static str,
    pub deleted_count: u64,
}

async fn delete_user_budgets(
    Path(user_id): Path<String>,
    Extension(store): Extension<Arc<dyn BudgetStore>>,
) -> ApiResult<Json<UserCleanupResponse>> {
    let deleted_count = store.delete_by_owner(&user_id).await?;
    info!(user_id = %user_id, deleted_count, "Deleted budgets for user");

    Ok(Json(UserCleanupResponse {
        status: "ok",
        deleted_count,
    }))
}

/// Create internal routes
pub fn internal_routes() -> Router {
    Router::new().route("/v1/internal/users/:user_id", delete(delete_user_budgets))
}
