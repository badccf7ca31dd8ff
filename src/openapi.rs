use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::{Server, ServerBuilder};
use utoipa::{Modify, OpenApi};

use crate::config::AppConfig;

/// 在 OpenAPI 中声明全局 `bearerAuth`（JWT）安全方案。
///
/// 令牌由插件阶段 4 的 TokenService 签发；文档层只负责声明方案，
/// 不承担任何授权判断。
struct BearerTokenSecurity;

impl Modify for BearerTokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        openapi.security = Some(vec![utoipa::openapi::security::SecurityRequirement::new(
            "bearerAuth",
            Vec::<String>::new(),
        )]);
    }
}

/// 从已初始化的全局配置派生文档的服务器地址。
///
/// 单测与离线文档生成不初始化全局配置，此时不声明 servers。
struct ConfiguredServers;

impl Modify for ConfiguredServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.servers = configured_servers(AppConfig::try_global());
    }
}

fn configured_servers(config: Option<&AppConfig>) -> Option<Vec<Server>> {
    config.map(|c| {
        vec![
            ServerBuilder::new()
                .url(format!("http://{}", c.server_addr()))
                .build(),
        ]
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(crate::routes::health::health_check, crate::routes::api_root),
    components(schemas(
        crate::error::ErrorEnvelope,
        crate::error::FieldViolation,
        crate::routes::health::HealthResponse,
        crate::routes::ApiRootResponse,
    )),
    modifiers(&BearerTokenSecurity, &ConfiguredServers),
    tags(
        (name = "Health", description = "健康检查：服务与数据库探活。"),
        (name = "Root", description = "服务信息入口。"),
    ),
    info(
        title = "Payroll System API",
        description = "薪酬管理系统后端（Axum）。业务路由组尚未落地，当前文档只覆盖引导层端点；所有失败响应统一为 ErrorEnvelope 形状。"
    )
)]
pub struct ApiDoc;
