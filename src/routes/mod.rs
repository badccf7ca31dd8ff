use axum::{Router, response::Json, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// 健康检查路由模块
pub mod health;

/// API 根响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiRootResponse {
    /// 服务名称
    #[schema(example = "Payroll System API")]
    pub message: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.1.0")]
    pub version: String,
    /// 文档入口路径
    #[schema(example = "/docs")]
    pub docs: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/",
    summary = "API 根端点",
    description = "返回服务名称、版本与文档入口。",
    responses((status = 200, description = "服务信息", body = ApiRootResponse)),
    tag = "Root"
)]
pub async fn api_root() -> Json<ApiRootResponse> {
    Json(ApiRootResponse {
        message: "Payroll System API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/docs".to_string(),
    })
}

/// 注册全部路由。
///
/// 业务路由组在本快照中尚未落地，保留占位以固定挂载点。
pub fn register_routes() -> Router<AppState> {
    let api_v1 = Router::new().route("/", get(api_root));
    // TODO: 挂载领域路由组
    // .nest("/auth", auth::router())
    // .nest("/companies", companies::router())
    // .nest("/employees", employees::router())
    // .nest("/payrolls", payrolls::router())

    Router::new()
        .route("/health", get(health::health_check))
        // axum 的 nest 不会把 `/api/v1/`（带尾斜杠）路由到内层 `/`，
        // 按 OpenAPI 声明的路径显式注册尾斜杠形式。
        .route("/api/v1/", get(api_root))
        .nest("/api/v1", api_v1)
}
