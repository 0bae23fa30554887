//! Health check endpoints with component-level diagnostics.
//!
//! Provides:
//! - `/v1` - plain-text banner
//! - `/v1/health` - simple "healthy" + version (for load balancers)
//! - `/v1/health/detailed` - per-component status (store, cache, stats breaker)

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tally_core::{BudgetStore, CacheLookup, CircuitState, StatusResolver};

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub timestamp: String,
}

/// Detailed health response with per-component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// All component health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub store: ComponentHealth,
    pub cache: ComponentHealth,
    pub stats: ComponentHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64, details: serde_json::Value) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
            details: Some(details),
        }
    }

    fn degraded(details: serde_json::Value) -> Self {
        Self {
            status: "degraded",
            latency_ms: None,
            error: None,
            details: Some(details),
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
            details: None,
        }
    }
}

async fn banner() -> &'static str {
    "Tally Budget Service"
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "TALLY BUDGET SERVICE",
        version: env!("CARGO_PKG_VERSION"),
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Detailed health check with all component statuses
async fn detailed_health_check(
    Extension(store): Extension<Arc<dyn BudgetStore>>,
    Extension(resolver): Extension<Arc<StatusResolver>>,
) -> Json<DetailedHealthResponse> {
    let store_health = check_store(store.as_ref()).await;
    let cache_health = check_cache(&resolver).await;
    let stats_health = check_stats(&resolver);

    // The cache and the stats provider degrade gracefully; only the store is fatal
    let status = if store_health.status == "healthy" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            store: store_health,
            cache: cache_health,
            stats: stats_health,
        },
    })
}

async fn check_store(store: &dyn BudgetStore) -> ComponentHealth {
    let start = Instant::now();
    match store.health_check().await {
        Ok(()) => ComponentHealth::healthy(
            start.elapsed().as_millis() as u64,
            serde_json::Value::Null,
        ),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    }
}

async fn check_cache(resolver: &StatusResolver) -> ComponentHealth {
    let cache = resolver.spend_cache();
    let start = Instant::now();
    let details = serde_json::json!({ "backend": cache.backend() });

    match cache.lookup("__health__").await {
        CacheLookup::Unavailable => ComponentHealth {
            status: "unavailable",
            latency_ms: None,
            error: Some("cache backend unreachable, lookups bypass the cache".to_string()),
            details: Some(details),
        },
        CacheLookup::Hit(_) | CacheLookup::Miss => {
            ComponentHealth::healthy(start.elapsed().as_millis() as u64, details)
        }
    }
}

fn check_stats(resolver: &StatusResolver) -> ComponentHealth {
    let breaker = resolver.spend_cache().gateway().breaker();
    let details = serde_json::json!({
        "circuit": breaker.state(),
        "errorRate": breaker.error_rate(),
    });

    match breaker.state() {
        CircuitState::Closed => ComponentHealth::healthy(0, details),
        CircuitState::Open | CircuitState::HalfOpen => ComponentHealth::degraded(details),
    }
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/v1", get(banner))
        .route("/v1/health", get(health_check))
        .route("/v1/health/detailed", get(detailed_health_check))
}
