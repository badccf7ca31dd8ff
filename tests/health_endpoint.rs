//! 健康检查集成测试：探测结果以数据形式上报，数据库不可达时降级为 503。

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use payroll_backend::routes::register_routes;
use payroll_backend::state::AppState;
use payroll_backend::storage::Storage;

async fn app_with_storage() -> (Router, Arc<Storage>) {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    let storage = Arc::new(Storage::from_pool(pool));
    let app = register_routes().with_state(AppState::new(storage.clone()));
    (app, storage)
}

async fn get_health(app: Router) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn healthy_storage_reports_connected() {
    let (app, _storage) = app_with_storage().await;
    let (status, body) = get_health(app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert!(body["uptime"].as_f64().expect("uptime") >= 0.0);
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn closed_storage_reports_disconnected_with_503() {
    let (app, storage) = app_with_storage().await;
    storage.close().await;

    let (status, body) = get_health(app).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["database"], "disconnected");
}
