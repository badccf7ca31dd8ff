//! 插件编排模块
//!
//! 按固定依赖顺序向请求管线注册横切能力。顺序即契约：
//!
//! 1. `security-headers` — 安全响应头（无前置条件）
//! 2. `cors` — 跨域来源策略（需在限流之前拒绝非法来源）
//! 3. `rate-limit` — 滑动窗口限流（按客户端地址）
//! 4. `token` — 身份令牌能力（仅机制，不含授权策略）
//! 5. `docs` — OpenAPI 文档（前置条件：全部路由已注册）
//!
//! 任一阶段注册失败都是启动致命错误：进程不得带着配置到一半的
//! 管线开始监听。

use std::time::Duration;

use axum::{Extension, Router};
use thiserror::Error;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::openapi::ApiDoc;

pub mod cors;
pub mod rate_limit;
pub mod security_headers;
pub mod token;

/// 插件注册的固定顺序（与请求期中间件执行顺序一致）。
pub const STAGE_ORDER: [&str; 5] = ["security-headers", "cors", "rate-limit", "token", "docs"];

/// 插件注册错误
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("跨域策略配置无效: {0}")]
    Cors(String),
    #[error("令牌服务初始化失败: {0}")]
    Token(String),
}

/// 按 [`STAGE_ORDER`] 注册全部插件，逐个等待完成后再进入下一阶段。
///
/// axum 的 `layer` 会包裹先前已注册的内容，后附加的层先执行；
/// 因此中间件按声明顺序的逆序附加，保证请求按
/// 安全头 → 跨域检查 → 限流 → 令牌能力 的顺序经过各层。
pub async fn register_plugins(router: Router, config: &AppConfig) -> Result<Router, PluginError> {
    tracing::debug!("插件注册顺序: {:?}", STAGE_ORDER);

    // 阶段 2：跨域策略
    let cors_layer = cors::build_cors_layer(config.environment, config.allowed_origins())
        .map_err(PluginError::Cors)?;
    tracing::info!("插件注册完成: cors ({:?})", config.environment);

    // 阶段 3：限流
    let limiter = rate_limit::RateLimiter::new(
        config.rate_limit.max,
        Duration::from_secs(config.rate_limit.window_secs),
    );
    tracing::info!(
        "插件注册完成: rate-limit (max={}, window={}s)",
        config.rate_limit.max,
        config.rate_limit.window_secs
    );

    // 阶段 4：令牌能力
    let tokens = token::TokenService::from_config(&config.jwt)
        .map_err(|e| PluginError::Token(e.to_string()))?;
    tracing::info!("插件注册完成: token");

    // 阶段 5：文档（要求全部路由已注册完毕）
    let router = router.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    tracing::info!("插件注册完成: docs (/docs)");

    // 中间件逆序附加（见模块文档）；阶段 1 的安全头位于最外层。
    Ok(router
        .layer(Extension(tokens))
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit_middleware,
        ))
        .layer(cors_layer)
        .layer(axum::middleware::from_fn(
            security_headers::security_headers_middleware,
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, MIN_SECRET_LEN, RuntimeEnv};

    fn plugin_config() -> AppConfig {
        AppConfig {
            jwt: JwtConfig {
                secret: "a".repeat(MIN_SECRET_LEN),
                refresh_secret: "b".repeat(MIN_SECRET_LEN),
                ..JwtConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn register_plugins_succeeds_with_valid_config() {
        let config = plugin_config();
        assert!(register_plugins(Router::new(), &config).await.is_ok());
    }

    #[tokio::test]
    async fn production_without_origins_is_fatal() {
        let mut config = plugin_config();
        config.environment = RuntimeEnv::Production;
        config.cors.origin = String::new();

        let err = register_plugins(Router::new(), &config)
            .await
            .expect_err("expected cors failure");
        assert!(matches!(err, PluginError::Cors(_)));
    }

    #[tokio::test]
    async fn empty_token_secret_is_fatal() {
        let mut config = plugin_config();
        config.jwt.secret = String::new();

        // 配置校验通常在更早阶段拦下，这里验证插件阶段的兜底
        let err = register_plugins(Router::new(), &config)
            .await
            .expect_err("expected token failure");
        assert!(matches!(err, PluginError::Token(_)));
    }
}
