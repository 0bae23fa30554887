//! Web API module for Tally
//!
//! Provides REST API endpoints for:
//! - Health checks
//! - Budget CRUD and status
//! - Quota-gated spend charts
//! - Internal user cleanup

pub mod budgets;
pub mod charts;
pub mod error;
pub mod health;
pub mod internal;

use axum::Router;

pub use budgets::budgets_routes;
pub use charts::{charts_routes, ChartSettings};
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use internal::internal_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(health_routes())
        .merge(budgets_routes())
        .merge(charts_routes())
        .merge(internal_routes())
}
