//! Stats providers
//!
//! A provider performs the raw "total spent" call with no protection of its
//! own. [`super::ExternalStatsGateway`] adds the timeout and circuit breaker.

use super::{GatewayError, GroupStats};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Raw source of group spending statistics
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetch stats for a group
    async fn fetch(&self, group_id: &str) -> Result<GroupStats, GatewayError>;
}

/// Either a bare payload or the `{status, data}` envelope used by the
/// expenses service.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatsBody {
    Wrapped { data: GroupStats },
    Bare(GroupStats),
}

impl From<StatsBody> for GroupStats {
    fn from(body: StatsBody) -> Self {
        match body {
            StatsBody::Wrapped { data } => data,
            StatsBody::Bare(stats) => stats,
        }
    }
}

/// HTTP provider: `GET {base_url}/stats/{group_id}`
#[derive(Debug, Clone)]
pub struct HttpStatsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatsProvider {
    /// Create a provider for the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create with a preconfigured client
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Base URL the provider calls
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stats_url(&self, group_id: &str) -> Result<reqwest::Url, GatewayError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Network(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Network("base url cannot have a path".to_string()))?
            .pop_if_empty()
            .push("stats")
            .push(group_id);
        Ok(url)
    }
}

#[async_trait]
impl StatsProvider for HttpStatsProvider {
    async fn fetch(&self, group_id: &str) -> Result<GroupStats, GatewayError> {
        let url = self.stats_url(group_id)?;
        debug!(url = %url, "Requesting group stats");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GatewayError::NonSuccessStatus(status.as_u16()));
        }

        let body: StatsBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(body.into())
    }
}

/// Fixed statistics for local runs with no provider configured
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStatsProvider;

impl MockStatsProvider {
    /// The fixed payload served by this provider
    #[must_use]
    pub fn stats() -> GroupStats {
        GroupStats {
            total_spent: 150.0,
            by_category: BTreeMap::from([
                ("FOOD".to_string(), 80.0),
                ("TRANSPORT".to_string(), 40.0),
                ("OTHER".to_string(), 30.0),
            ]),
        }
    }
}

#[async_trait]
impl StatsProvider for MockStatsProvider {
    async fn fetch(&self, group_id: &str) -> Result<GroupStats, GatewayError> {
        debug!(group_id = %group_id, "Serving mock group stats");
        Ok(Self::stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/v1/internal", addr)
    }

    #[tokio::test]
    async fn test_http_provider_reads_wrapped_payload() {
        let router = Router::new().route(
            "/api/v1/internal/stats/:group_id",
            get(|Path(group_id): Path<String>| async move {
                Json(serde_json::json!({
                    "status": "ok",
                    "data": {
                        "totalSpent": if group_id == "g1" { 99.5 } else { 0.0 },
                        "byCategory": { "FOOD": 99.5 }
                    }
                }))
            }),
        );
        let provider = HttpStatsProvider::new(spawn_server(router).await);

        let stats = provider.fetch("g1").await.unwrap();
        assert_eq!(stats.total_spent, 99.5);
        assert_eq!(stats.by_category.get("FOOD"), Some(&99.5));
    }

    #[tokio::test]
    async fn test_http_provider_reads_bare_payload() {
        let router = Router::new().route(
            "/api/v1/internal/stats/:group_id",
            get(|| async { Json(serde_json::json!({ "totalSpent": 12.0 })) }),
        );
        let provider = HttpStatsProvider::new(spawn_server(router).await);

        let stats = provider.fetch("g1").await.unwrap();
        assert_eq!(stats.total_spent, 12.0);
        assert!(stats.by_category.is_empty());
    }

    #[tokio::test]
    async fn test_http_provider_non_200_is_failure() {
        let router = Router::new().route(
            "/api/v1/internal/stats/:group_id",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let provider = HttpStatsProvider::new(spawn_server(router).await);

        let err = provider.fetch("g1").await.unwrap_err();
        assert!(matches!(err, GatewayError::NonSuccessStatus(503)));
    }

    #[tokio::test]
    async fn test_http_provider_connection_refused_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = HttpStatsProvider::new(format!("http://{}", addr));
        let err = provider.fetch("g1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
    }

    #[test]
    fn test_stats_url_escapes_group_id() {
        let provider = HttpStatsProvider::new("http://stats.local/api/v1/internal/");
        let url = provider.stats_url("team a/b").unwrap();
        assert_eq!(
            url.as_str(),
            "http://stats.local/api/v1/internal/stats/team%20a%2Fb"
        );
    }

    #[tokio::test]
    async fn test_mock_provider_fixed_payload() {
        let stats = MockStatsProvider.fetch("anything").await.unwrap();
        assert_eq!(stats.total_spent, 150.0);
        assert_eq!(stats.by_category.len(), 3);
    }
}
