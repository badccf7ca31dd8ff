use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::RuntimeEnv;

/// 根据运行环境与允许列表构建跨域策略层。
///
/// - 非生产环境：仅放行 localhost / 回环来源，便于本地前端联调；
/// - 生产环境：仅放行配置允许列表中的精确来源；
/// - 放行的来源允许携带凭证（Cookie / Authorization）。
pub fn build_cors_layer(env: RuntimeEnv, allow_list: Vec<String>) -> Result<CorsLayer, String> {
    if env.is_production() && allow_list.is_empty() {
        return Err("生产环境必须提供允许来源列表".to_string());
    }

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin
            .to_str()
            .map(|o| origin_allowed(env, &allow_list, o))
            .unwrap_or(false)
    });

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

/// 判定某个来源是否被放行（纯函数，便于单测覆盖策略矩阵）。
pub fn origin_allowed(env: RuntimeEnv, allow_list: &[String], origin: &str) -> bool {
    if env.is_production() {
        allow_list.iter().any(|allowed| allowed == origin)
    } else {
        matches!(
            origin_host(origin),
            Some("localhost" | "127.0.0.1" | "[::1]")
        )
    }
}

/// 提取来源中的 host 部分（`scheme://host[:port]`，IPv6 连同方括号返回）。
fn origin_host(origin: &str) -> Option<&str> {
    let rest = origin.split_once("://").map(|(_, r)| r)?;
    if rest.starts_with('[') {
        let end = rest.find(']')?;
        return Some(&rest[..=end]);
    }
    let end = rest.find([':', '/']).unwrap_or(rest.len());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_allows_loopback_origins_only() {
        let env = RuntimeEnv::Development;
        assert!(origin_allowed(env, &[], "http://localhost:5173"));
        assert!(origin_allowed(env, &[], "http://127.0.0.1:3000"));
        assert!(origin_allowed(env, &[], "http://[::1]:8080"));
        assert!(!origin_allowed(env, &[], "http://evil.example"));
        // 开发模式不看允许列表
        assert!(!origin_allowed(
            env,
            &["http://evil.example".to_string()],
            "http://evil.example"
        ));
    }

    #[test]
    fn production_matches_allow_list_exactly() {
        let env = RuntimeEnv::Production;
        let list = vec!["https://a.com".to_string(), "https://b.com".to_string()];
        assert!(origin_allowed(env, &list, "https://a.com"));
        assert!(origin_allowed(env, &list, "https://b.com"));
        assert!(!origin_allowed(env, &list, "https://c.com"));
        // 生产模式不放行 localhost
        assert!(!origin_allowed(env, &list, "http://localhost:5173"));
    }

    #[test]
    fn origin_host_parses_port_and_ipv6() {
        assert_eq!(origin_host("http://localhost:5173"), Some("localhost"));
        assert_eq!(origin_host("https://a.com"), Some("a.com"));
        assert_eq!(origin_host("http://[::1]:8080"), Some("[::1]"));
        assert_eq!(origin_host("no-scheme"), None);
    }

    #[test]
    fn production_without_allow_list_fails_registration() {
        assert!(build_cors_layer(RuntimeEnv::Production, Vec::new()).is_err());
        assert!(build_cors_layer(RuntimeEnv::Development, Vec::new()).is_ok());
    }
}
