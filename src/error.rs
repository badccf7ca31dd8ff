use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::request_context;

/// 字段级校验违规：点分字段路径 + 人类可读消息 + 机器码。
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FieldViolation {
    /// 字段路径（点分，如 `employee.email`）
    pub field: String,
    /// 违规说明
    pub message: String,
    /// 稳定的机器码（如 `invalid_type`）
    pub code: String,
}

impl FieldViolation {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// 存储层故障，按驱动错误码归入封闭子类。
///
/// 分类依据是约束种类而不是具体 SQL 文本，驱动原始诊断只进服务端日志。
#[derive(Debug, Error)]
pub enum StorageFault {
    /// 唯一约束冲突（写入了已存在的数据）
    #[error("唯一约束冲突")]
    UniqueViolation {
        /// 冲突约束名（驱动可提供时）
        constraint: Option<String>,
    },
    /// 写操作目标记录不存在
    #[error("目标记录不存在")]
    RecordNotFound,
    /// 外键（引用完整性）约束失败
    #[error("外键约束失败")]
    ForeignKeyViolation,
    /// 其余未归类的存储故障
    #[error("存储故障: {0}")]
    Other(String),
}

impl From<sqlx::Error> for StorageFault {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::RowNotFound => StorageFault::RecordNotFound,
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation => StorageFault::UniqueViolation {
                    constraint: db.constraint().map(str::to_string),
                },
                ErrorKind::ForeignKeyViolation => StorageFault::ForeignKeyViolation,
                _ => StorageFault::Other(db.message().to_string()),
            },
            other => StorageFault::Other(other.to_string()),
        }
    }
}

/// 应用统一故障类型：分类器的输入。
///
/// 封闭的判别集合，每个变体只携带其分类分支所需的元数据；
/// 路由与业务逻辑不单独捕获并格式化错误，统一传播到这里成形。
#[derive(Debug, Error)]
pub enum ApiError {
    /// 结构化校验失败（schema 拒绝）：逐字段上报全部违规，而不止第一条
    #[error("请求校验失败")]
    Validation(Vec<FieldViolation>),
    /// 存储约束故障
    #[error("存储故障: {0}")]
    Storage(#[from] StorageFault),
    /// 传输层请求体解析失败（尚未进入业务逻辑）
    #[error("请求体解析失败: {0}")]
    BodyRejection(String),
    /// 缺失或无效的身份凭证
    #[error("需要身份认证")]
    Unauthorized,
    /// 身份有效但权限不足
    #[error("权限不足")]
    Forbidden,
    /// 触发限流
    #[error("请求过于频繁")]
    RateLimited {
        /// 建议的重试等待时间（秒），写入 Retry-After 响应头
        retry_after_secs: u64,
    },
    /// 显式携带 4xx 状态的客户端错误
    #[error("{message}")]
    Client {
        status: u16,
        name: String,
        message: String,
    },
    /// 内部错误：真实原因只进日志，响应体固定为通用消息
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 由显式状态码构造故障。
    ///
    /// 4xx 保留调用方给定的名称与消息；任何 >= 500 的状态一律折叠为
    /// [`ApiError::Internal`]，确保内部诊断不会经由这条路径外泄。
    pub fn http(status: StatusCode, name: impl Into<String>, message: impl Into<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                retry_after_secs: 0,
            },
            s if s.is_client_error() => ApiError::Client {
                status: s.as_u16(),
                name: name.into(),
                message: message.into(),
            },
            _ => ApiError::Internal(message.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BodyRejection(rejection.body_text())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Storage(StorageFault::from(err))
    }
}

/// 规范化错误响应（对外兼容契约，形状跨所有失败类别稳定）。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// 稳定的错误类别标签
    #[schema(example = "Validation Error")]
    pub error: String,
    /// 人类可读消息（>= 500 与 401/403/429 一律为固定通用文案）
    pub message: String,
    /// HTTP 状态码（与 `error` 标签一致）
    #[schema(example = 400)]
    pub status_code: u16,
    /// ISO-8601 时间戳
    pub timestamp: String,
    /// 出错请求的路径
    pub path: String,
    /// 可选的结构化细节（仅部分类别携带）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    /// 将故障映射为规范化错误响应。按声明顺序首个命中分支生效；
    /// 存储故障的专有分类优先于通用状态码分类。
    pub fn classify(fault: &ApiError, path: &str) -> Self {
        let (error, message, status_code, details): (&str, String, u16, Option<serde_json::Value>) =
            match fault {
                ApiError::Validation(violations) => (
                    "Validation Error",
                    "Request validation failed".to_string(),
                    400,
                    Some(json!(violations)),
                ),
                ApiError::Storage(StorageFault::UniqueViolation { constraint }) => (
                    "Conflict",
                    "A record with this data already exists".to_string(),
                    409,
                    constraint.as_ref().map(|c| json!({ "constraint": c })),
                ),
                ApiError::Storage(StorageFault::RecordNotFound) => {
                    ("Not Found", "Record not found".to_string(), 404, None)
                }
                ApiError::Storage(StorageFault::ForeignKeyViolation) => (
                    "Bad Request",
                    "Foreign key constraint failed".to_string(),
                    400,
                    None,
                ),
                ApiError::Storage(StorageFault::Other(_)) => (
                    "Database Error",
                    "A database error occurred".to_string(),
                    500,
                    None,
                ),
                ApiError::BodyRejection(diagnostic) => (
                    "Validation Error",
                    diagnostic.clone(),
                    400,
                    Some(json!(diagnostic)),
                ),
                ApiError::Unauthorized => (
                    "Unauthorized",
                    "Authentication required".to_string(),
                    401,
                    None,
                ),
                ApiError::Forbidden => (
                    "Forbidden",
                    "Insufficient permissions".to_string(),
                    403,
                    None,
                ),
                ApiError::RateLimited { .. } => (
                    "Too Many Requests",
                    "Rate limit exceeded".to_string(),
                    429,
                    None,
                ),
                ApiError::Client {
                    status,
                    name,
                    message,
                } => (
                    if name.is_empty() { "Client Error" } else { name },
                    message.clone(),
                    *status,
                    None,
                ),
                ApiError::Internal(_) => (
                    "Internal Server Error",
                    "An unexpected error occurred".to_string(),
                    500,
                    None,
                ),
            };

        Self {
            error: error.to_string(),
            message,
            status_code,
            timestamp: Utc::now().to_rfc3339(),
            path: path.to_string(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (method, path) = request_context::current_route().unwrap_or_default();
        let request_id = request_context::current_request_id().unwrap_or_default();

        // 分类前先落完整故障日志：真实消息与细节只进服务端日志，不进响应体。
        tracing::error!(fault = ?self, %request_id, %method, %path, "request error");

        let envelope = ErrorEnvelope::classify(&self, &path);
        let status = envelope.status();
        let mut res = Json(envelope).into_response();
        *res.status_mut() = status;

        if let ApiError::RateLimited { retry_after_secs } = self
            && retry_after_secs > 0
        {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        res
    }
}
