//! Server initialization
//!
//! Wires stores, cache, gateway and quota ledger together, builds the
//! router and runs it until a shutdown signal arrives.

use super::config::{AppConfig, StoreBackend};
use super::loader::{is_production, load_config};
use super::validation::validate_config;
use crate::api::ChartSettings;
use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::{Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{
    BudgetStore, CacheStore, ExternalStatsGateway, HttpStatsProvider, MemoryBudgetStore,
    MemoryCacheStore, MockStatsProvider, QuotaLedger, RedisCacheStore, SpendCache,
    SqliteBudgetStore, StatsFallback, StatusResolver,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared services handed to the HTTP layer
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn BudgetStore>,
    pub resolver: Arc<StatusResolver>,
    pub quota: Arc<QuotaLedger>,
    pub charts: ChartSettings,
}

/// Build every service from configuration
pub async fn build_services(config: &AppConfig) -> Result<AppServices> {
    let store: Arc<dyn BudgetStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory budget store");
            Arc::new(MemoryBudgetStore::new())
        }
        StoreBackend::Sqlite => {
            let store = SqliteBudgetStore::new(&config.store.path)
                .await
                .with_context(|| format!("Failed to open budget store at {}", config.store.path))?;
            info!(path = %config.store.path, "Using SQLite budget store");
            Arc::new(store)
        }
    };

    let cache_store: Arc<dyn CacheStore> = if config.redis.enabled {
        let redis = RedisCacheStore::new(&config.redis.url).context("Invalid Redis URL")?;
        if let Err(e) = redis.ping().await {
            warn!(error = %e, "Redis not reachable at startup; spend lookups will bypass the cache");
        }
        Arc::new(redis)
    } else {
        info!("Redis disabled, using in-process spend cache");
        Arc::new(MemoryCacheStore::new())
    };

    let gateway_config = config.stats.gateway_config();
    let gateway = if config.stats.uses_mock() {
        info!("Stats provider not configured, serving mock statistics");
        ExternalStatsGateway::new(Arc::new(MockStatsProvider), gateway_config)
            .with_fallback(StatsFallback::Mock)
    } else {
        info!(base_url = %config.stats.base_url, "Using HTTP stats provider");
        ExternalStatsGateway::new(
            Arc::new(HttpStatsProvider::new(config.stats.base_url.clone())),
            gateway_config,
        )
    };

    let spend = SpendCache::new(cache_store, Arc::new(gateway))
        .with_ttl(Duration::from_secs(config.cache.ttl_secs));

    Ok(AppServices {
        resolver: Arc::new(StatusResolver::new(store.clone(), Arc::new(spend))),
        store,
        quota: Arc::new(QuotaLedger::new()),
        charts: ChartSettings {
            enabled: config.charts.enabled,
        },
    })
}

/// CORS policy: permissive outside production, a single origin in production
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !is_production() {
        return CorsLayer::permissive();
    }

    match config
        .server
        .cors_origin
        .as_deref()
        .map(HeaderValue::from_str)
    {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any),
        Some(Err(e)) => {
            warn!(error = %e, "Invalid server.cors_origin, denying cross-origin requests");
            CorsLayer::new()
        }
        None => CorsLayer::new(),
    }
}

/// Build the router with all endpoints and layers
pub fn build_router(services: &AppServices, cors: CorsLayer) -> Router {
    crate::api::api_router()
        .layer(Extension(services.store.clone()))
        .layer(Extension(services.resolver.clone()))
        .layer(Extension(services.quota.clone()))
        .layer(Extension(services.charts))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Periodically drop expired quota counters
fn spawn_quota_sweep(quota: Arc<QuotaLedger>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            quota.compact();
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Run the HTTP server until shutdown
pub async fn run() -> Result<()> {
    let config = load_config()?;
    validate_config(&config)?;

    let services = build_services(&config).await?;
    let app = build_router(&services, cors_layer(&config));

    let sweep = if config.charts.enabled {
        Some(spawn_quota_sweep(
            services.quota.clone(),
            Duration::from_secs(config.charts.quota_sweep_secs.max(1)),
        ))
    } else {
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);
    info!("Health check: http://{}/v1/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(handle) = sweep {
        handle.abort();
    }

    info!("Tally shutdown complete");
    Ok(())
}
