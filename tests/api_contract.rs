//! 完整管线的对外契约：路由注册 + 插件编排后各端点可达且响应符合约定。

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use payroll_backend::config::{AppConfig, JwtConfig, MIN_SECRET_LEN};
use payroll_backend::plugins::register_plugins;
use payroll_backend::request_context::request_context_middleware;
use payroll_backend::routes::register_routes;
use payroll_backend::state::AppState;
use payroll_backend::storage::Storage;

fn test_config() -> AppConfig {
    AppConfig {
        jwt: JwtConfig {
            secret: "a".repeat(MIN_SECRET_LEN),
            refresh_secret: "b".repeat(MIN_SECRET_LEN),
            ..JwtConfig::default()
        },
        ..AppConfig::default()
    }
}

/// 按生命周期的装配顺序组装完整应用：路由 → 插件 → 请求上下文。
async fn full_app() -> Router {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    let storage = Arc::new(Storage::from_pool(pool));

    let router = register_routes().with_state(AppState::new(storage));
    let app = register_plugins(router, &test_config())
        .await
        .expect("register plugins");
    app.layer(axum::middleware::from_fn(request_context_middleware))
}

async fn get_json(app: Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn api_root_reports_service_metadata() {
    let (status, body) = get_json(full_app().await, "/api/v1/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payroll System API");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["docs"], "/docs");
}

#[tokio::test]
async fn health_endpoint_is_reachable_through_full_pipeline() {
    let (status, body) = get_json(full_app().await, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (status, body) = get_json(full_app().await, "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Payroll System API");
    assert!(body["paths"].get("/health").is_some());
    assert!(body["paths"].get("/api/v1/").is_some());
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let response = full_app()
        .await
        .oneshot(
            Request::builder()
                .uri("/api/v1/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap();
    assert!(request_id.starts_with("req_"));
}
