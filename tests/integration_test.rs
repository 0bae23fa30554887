//! Integration tests for the Tally HTTP surface
//!
//! Drives the full router in-process with `tower::ServiceExt::oneshot`,
//! using the in-memory budget store, the in-process spend cache and the mock
//! stats provider (total spent 150).

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use tally::server::config::AppConfig;
use tally::server::{build_router, build_services};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

// ============================================================================
// Helpers
// ============================================================================

async fn app_with(config: AppConfig) -> Router {
    let services = build_services(&config).await.unwrap();
    build_router(&services, CorsLayer::permissive())
}

async fn app() -> Router {
    app_with(AppConfig::default()).await
}

fn bearer(sub: &str, plan: &str) -> String {
    let payload = json!({ "sub": sub, "plan": plan }).to_string();
    format!(
        "Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.fake",
        URL_SAFE_NO_PAD.encode(payload)
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: Method, uri: &str, auth: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn create_budget(app: &Router, auth: &str, group: &str, limit: f64) -> Value {
    let body = json!({
        "groupId": group,
        "category": "Food",
        "limitAmount": limit,
        "period": "monthly",
    })
    .to_string();
    let (status, created) = send(app, json_request(Method::POST, "/v1/budgets", Some(auth), &body)).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", created);
    created
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_healthy() {
    let app = app().await;

    let (status, body) = send(&app, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_banner_is_plain_text() {
    let app = app().await;
    let (status, body) = send(&app, get("/v1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Tally Budget Service".to_string()));
}

#[tokio::test]
async fn test_detailed_health_lists_components() {
    let app = app().await;

    let (status, body) = send(&app, get("/v1/health/detailed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"]["status"], "healthy");
    assert_eq!(body["checks"]["cache"]["details"]["backend"], "memory");
    assert_eq!(body["checks"]["stats"]["details"]["circuit"], "CLOSED");
}

// ============================================================================
// Budget CRUD
// ============================================================================

#[tokio::test]
async fn test_create_requires_identity() {
    let app = app().await;
    let body = r#"{"groupId":"g","limitAmount":500,"period":"monthly"}"#;

    let (status, _) = send(&app, json_request(Method::POST, "/v1/budgets", None, body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_assigns_owner_from_token() {
    let app = app().await;
    let created = create_budget(&app, &bearer("test-user-123", "PRO"), "test-group", 500.0).await;

    assert_eq!(created["groupId"], "test-group");
    assert_eq!(created["ownerId"], "test-user-123");
    assert_eq!(created["limitAmount"], 500.0);
    assert!(created["id"].is_string());
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let app = app().await;
    let auth = bearer("u1", "FREE");

    let cases = [
        "invalid json",
        r#"{"limitAmount":500,"period":"monthly"}"#,
        r#"{"groupId":"g","limitAmount":-1,"period":"monthly"}"#,
        r#"{"groupId":"","limitAmount":10,"period":"monthly"}"#,
    ];
    for body in cases {
        let (status, response) =
            send(&app, json_request(Method::POST, "/v1/budgets", Some(&auth), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?} gave {}", body, response);
        assert_eq!(response["error"], "Validation error");
    }
}

#[tokio::test]
async fn test_list_group_budgets() {
    let app = app().await;
    let auth = bearer("u1", "FREE");
    create_budget(&app, &auth, "household", 100.0).await;
    create_budget(&app, &auth, "household", 200.0).await;
    create_budget(&app, &auth, "travel", 300.0).await;

    let (status, body) = send(&app, get("/v1/budgets/group/household")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groupId"], "household");
    assert_eq!(body["count"], 2);

    let (_, empty) = send(&app, get("/v1/budgets/group/non-existent-group")).await;
    assert_eq!(empty["budgets"], json!([]));
    assert_eq!(empty["count"], 0);

    let (_, all) = send(&app, get("/v1/budgets")).await;
    assert_eq!(all.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_update_limit() {
    let app = app().await;
    let created = create_budget(&app, &bearer("u1", "FREE"), "g", 500.0).await;
    let uri = format!("/v1/budgets/{}", created["id"].as_str().unwrap());

    let (status, body) =
        send(&app, json_request(Method::PUT, &uri, None, r#"{"limitAmount":750}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limitAmount"], 750.0);

    let (status, _) =
        send(&app, json_request(Method::PUT, &uri, None, r#"{"invalidField":"value"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&app, json_request(Method::PUT, &uri, None, r#"{"limitAmount":-5}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_unknown_budget_is_not_found() {
    let app = app().await;
    let body = r#"{"limitAmount":100}"#;

    let uri = format!("/v1/budgets/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&app, json_request(Method::PUT, &uri, None, body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        json_request(Method::PUT, "/v1/budgets/507f1f77bcf86cd799439011", None, body),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_budget() {
    let app = app().await;
    let created = create_budget(&app, &bearer("u1", "FREE"), "delete-test-group", 100.0).await;
    let uri = format!("/v1/budgets/{}", created["id"].as_str().unwrap());

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn test_status_round_trip() {
    let app = app().await;
    let created = create_budget(&app, &bearer("u1", "FREE"), "g", 500.0).await;
    let uri = format!("/v1/budgets/{}/status", created["id"].as_str().unwrap());

    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "limit": 500.0, "spent": 150.0, "health": "OK" }));
}

#[tokio::test]
async fn test_status_health_levels() {
    let app = app().await;
    let auth = bearer("u1", "FREE");

    for (limit, expected) in [(180.0, "WARNING"), (100.0, "OVERBUDGET"), (187.5, "OK")] {
        let created = create_budget(&app, &auth, "g", limit).await;
        let uri = format!("/v1/budgets/{}/status", created["id"].as_str().unwrap());
        let (_, body) = send(&app, get(&uri)).await;
        assert_eq!(body["health"], expected, "limit {}", limit);
    }
}

#[tokio::test]
async fn test_status_unknown_budget_is_not_found() {
    let app = app().await;

    let (status, body) = send(&app, get(&format!("/v1/budgets/{}/status", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, _) = send(&app, get("/v1/budgets/507f1f77bcf86cd799439011/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Charts and quota
// ============================================================================

#[tokio::test]
async fn test_chart_quota_free_plan() {
    let app = app().await;
    let auth = bearer("chart-user", "FREE");
    let created = create_budget(&app, &auth, "g", 500.0).await;
    let uri = format!("/v1/budgets/{}/chart", created["id"].as_str().unwrap());

    for _ in 0..2 {
        let (status, body) = send(&app, get_as(&uri, &auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["url"].as_str().unwrap().contains("quickchart.io"));
    }

    let (status, body) = send(&app, get_as(&uri, &auth)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Rate limit exceeded for chart endpoint");
    assert_eq!(body["plan"], "FREE");
    assert_eq!(body["limit"], 2);
    assert!(body["resetAt"].is_string());

    // A different caller has its own quota
    let (status, _) = send(&app, get_as(&uri, &bearer("other-user", "FREE"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_chart_reports_remaining_quota_in_headers() {
    let app = app().await;
    let auth = bearer("header-user", "PRO");
    let created = create_budget(&app, &auth, "g", 500.0).await;
    let uri = format!("/v1/budgets/{}/chart", created["id"].as_str().unwrap());

    for expected in ["14", "13"] {
        let response = app.clone().oneshot(get_as(&uri, &auth)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "15");
        assert_eq!(response.headers()["x-ratelimit-remaining"], expected);
    }
}

#[tokio::test]
async fn test_anonymous_chart_quota_keyed_by_client_address() {
    let app = app().await;
    let created = create_budget(&app, &bearer("u1", "FREE"), "g", 500.0).await;
    let uri = format!("/v1/budgets/{}/chart", created["id"].as_str().unwrap());

    let from = |ip: &str| {
        Request::builder()
            .uri(&uri)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, from("203.0.113.1")).await.0, StatusCode::OK);
    assert_eq!(send(&app, from("203.0.113.1")).await.0, StatusCode::OK);
    assert_eq!(send(&app, from("203.0.113.1")).await.0, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(send(&app, from("203.0.113.2")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_chart_disabled_returns_503() {
    let mut config = AppConfig::default();
    config.charts.enabled = false;
    let app = app_with(config).await;
    let created = create_budget(&app, &bearer("u1", "FREE"), "g", 500.0).await;
    let uri = format!("/v1/budgets/{}/chart", created["id"].as_str().unwrap());

    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Feature Disabled");
}

#[tokio::test]
async fn test_quota_endpoint_does_not_consume() {
    let app = app().await;
    let auth = bearer("peek-user", "PRO");
    let created = create_budget(&app, &auth, "g", 500.0).await;

    let (status, before) = send(&app, get_as("/v1/quota/chart", &auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["plan"], "PRO");
    assert_eq!(before["limit"], 15);
    assert_eq!(before["remaining"], 15);

    let (_, again) = send(&app, get_as("/v1/quota/chart", &auth)).await;
    assert_eq!(again["remaining"], 15);

    let uri = format!("/v1/budgets/{}/chart", created["id"].as_str().unwrap());
    send(&app, get_as(&uri, &auth)).await;

    let (_, after) = send(&app, get_as("/v1/quota/chart", &auth)).await;
    assert_eq!(after["remaining"], 14);
    assert_eq!(after["allowed"], true);
}

// ============================================================================
// Internal user cleanup
// ============================================================================

#[tokio::test]
async fn test_user_cleanup_deletes_owned_budgets() {
    let app = app().await;
    let saga = bearer("saga-test-user", "FREE");
    create_budget(&app, &saga, "saga-group-1", 100.0).await;
    create_budget(&app, &saga, "saga-group-2", 200.0).await;
    create_budget(&app, &bearer("someone-else", "FREE"), "saga-group-1", 50.0).await;

    let (status, body) = send(&app, delete("/v1/internal/users/saga-test-user")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "deletedCount": 2 }));

    let (_, remaining) = send(&app, get("/v1/budgets/group/saga-group-1")).await;
    assert_eq!(remaining["count"], 1);
}

#[tokio::test]
async fn test_user_cleanup_with_nothing_to_delete() {
    let app = app().await;

    let (status, body) = send(&app, delete("/v1/internal/users/non-existent-user-12345")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["deletedCount"], 0);
}
