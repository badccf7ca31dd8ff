use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// 当前请求的上下文快照：错误分类器出响应时需要路径与方法。
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
}

tokio::task_local! {
    /// 当前异步任务绑定的请求上下文，用于错误响应透传。
    static TASK_REQUEST_CONTEXT: RequestContext;
}

/// 获取当前请求上下文中的 request_id。
pub fn current_request_id() -> Option<String> {
    TASK_REQUEST_CONTEXT
        .try_with(|ctx| ctx.request_id.clone())
        .ok()
}

/// 获取当前请求的 (method, path)。中间件作用域之外返回 None。
pub fn current_route() -> Option<(String, String)> {
    TASK_REQUEST_CONTEXT
        .try_with(|ctx| (ctx.method.clone(), ctx.path.clone()))
        .ok()
}

fn is_valid_request_id(v: &str) -> bool {
    !v.is_empty()
        && v.len() <= 128
        && v.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

fn resolve_request_id(req: &Request) -> String {
    if let Some(raw) = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        && is_valid_request_id(raw)
    {
        return raw.to_string();
    }
    format!("req_{}", Uuid::new_v4().simple())
}

/// 全局请求上下文中间件：
/// - 优先透传客户端传入的 `X-Request-Id`，缺失或非法时服务端生成
/// - 捕获请求方法与路径，注入任务上下文供错误分类器使用
/// - request_id 回写到响应头
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let context = RequestContext {
        request_id: resolve_request_id(&req),
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
    };
    let request_id = context.request_id.clone();
    req.extensions_mut().insert(context.clone());

    let mut res = TASK_REQUEST_CONTEXT
        .scope(context, async move { next.run(req).await })
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert("x-request-id", value);
    }

    res
}
