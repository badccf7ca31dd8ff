//! 薪酬系统后端引导层
//!
//! 负责把进程从环境变量一路带到可监听状态：配置加载与校验、
//! 横切插件编排、统一错误分类、生命周期与优雅停机。
//! 业务路由组（认证、公司、员工、薪酬）在路由层保留挂载点。

/// 应用配置（环境变量加载 + 集中校验）
pub mod config;
/// 统一错误分类与响应信封
pub mod error;
/// 生命周期编排（启动顺序与退出码）
pub mod lifecycle;
/// OpenAPI 文档声明
pub mod openapi;
/// 横切插件编排（安全头、跨域、限流、令牌、文档）
pub mod plugins;
/// 请求上下文（请求 ID 与路由信息的任务级传播）
pub mod request_context;
/// 路由注册
pub mod routes;
/// 停机闩锁与信号处理
pub mod shutdown;
/// 应用状态
pub mod state;
/// 存储句柄（连接池生命周期）
pub mod storage;

pub use config::AppConfig;
pub use error::{ApiError, ErrorEnvelope, FieldViolation, StorageFault};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::AppState;
pub use storage::Storage;
