use std::fmt;

use config::{Config as ConfigBuilder, ConfigError, Environment};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 密钥与加密 Key 的最小长度（熵下限）
pub const MIN_SECRET_LEN: usize = 32;

/// 运行环境
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnv {
    /// 开发环境
    #[default]
    Development,
    /// 生产环境
    Production,
    /// 测试环境
    Test,
}

impl RuntimeEnv {
    pub fn is_production(self) -> bool {
        self == RuntimeEnv::Production
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        3001
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（trace|debug|info|warn|error）
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    const ALLOWED_LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// 数据库连接串（必填）
    #[serde(default)]
    pub url: String,
}

/// 令牌签发配置（主密钥对 + 刷新密钥对，两者相互独立）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// 主签名密钥（必填，长度 >= 32）
    #[serde(default)]
    pub secret: String,
    /// 访问令牌有效期（秒）
    #[serde(default = "JwtConfig::default_expires_in")]
    pub expires_in_secs: u64,
    /// 刷新令牌签名密钥（必填，长度 >= 32，与主密钥独立）
    #[serde(default)]
    pub refresh_secret: String,
    /// 刷新令牌有效期（秒）
    #[serde(default = "JwtConfig::default_refresh_expires_in")]
    pub refresh_expires_in_secs: u64,
}

impl JwtConfig {
    fn default_expires_in() -> u64 {
        15 * 60
    }
    fn default_refresh_expires_in() -> u64 {
        7 * 24 * 60 * 60
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            expires_in_secs: Self::default_expires_in(),
            refresh_secret: String::new(),
            refresh_expires_in_secs: Self::default_refresh_expires_in(),
        }
    }
}

/// 限流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 窗口内允许的最大请求数
    #[serde(default = "RateLimitConfig::default_max")]
    pub max: u32,
    /// 滑动窗口长度（秒）
    #[serde(default = "RateLimitConfig::default_window")]
    pub window_secs: u64,
}

impl RateLimitConfig {
    fn default_max() -> u32 {
        100
    }
    fn default_window() -> u64 {
        15 * 60
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max: Self::default_max(),
            window_secs: Self::default_window(),
        }
    }
}

/// 第三方支付凭证（可选，本快照仅加载不消费）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StripeConfig {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    /// 对称加密密钥（必填，长度 >= 32）
    #[serde(default)]
    pub encryption_key: String,
}

/// 跨域配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 允许的来源列表（逗号分隔），仅在生产环境生效
    #[serde(default = "CorsConfig::default_origin")]
    pub origin: String,
}

impl CorsConfig {
    fn default_origin() -> String {
        "http://localhost:3000".to_string()
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: Self::default_origin(),
        }
    }
}

/// 应用配置：启动时从环境变量构建一次，之后全程只读。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 运行环境
    #[serde(default)]
    pub environment: RuntimeEnv,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

/// 单条配置违规项
#[derive(Debug, Clone)]
pub struct ConfigViolation {
    /// 违规字段（点分路径）
    pub field: &'static str,
    /// 违规说明
    pub message: String,
}

/// 配置违规集合：一次性列出全部问题，而不是在首个错误处停下。
#[derive(Debug)]
pub struct ConfigViolations(pub Vec<ConfigViolation>);

impl fmt::Display for ConfigViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for v in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
            first = false;
        }
        Ok(())
    }
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// 环境变量解析失败
    #[error("配置解析失败: {0}")]
    Parse(#[from] ConfigError),
    /// 字段校验失败（包含全部违规项）
    #[error("配置校验失败: {0}")]
    Invalid(ConfigViolations),
}

impl AppConfig {
    /// 从进程环境变量加载配置并完成校验。
    ///
    /// 变量形如 `APP_JWT__SECRET`、`APP_SERVER__PORT`（`__` 为层级分隔符）。
    pub fn load() -> Result<Self, ConfigLoadError> {
        let builder = ConfigBuilder::builder()
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = builder.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置快照。收集所有违规字段后一并返回，便于一次性修复。
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let mut violations = Vec::new();

        if self.database.url.trim().is_empty() {
            violations.push(ConfigViolation {
                field: "database.url",
                message: "必须提供数据库连接串".to_string(),
            });
        }
        if self.jwt.secret.len() < MIN_SECRET_LEN {
            violations.push(ConfigViolation {
                field: "jwt.secret",
                message: format!("长度不足 {MIN_SECRET_LEN} 个字符"),
            });
        }
        if self.jwt.refresh_secret.len() < MIN_SECRET_LEN {
            violations.push(ConfigViolation {
                field: "jwt.refresh_secret",
                message: format!("长度不足 {MIN_SECRET_LEN} 个字符"),
            });
        }
        if self.security.encryption_key.len() < MIN_SECRET_LEN {
            violations.push(ConfigViolation {
                field: "security.encryption_key",
                message: format!("长度不足 {MIN_SECRET_LEN} 个字符"),
            });
        }
        if !LoggingConfig::ALLOWED_LEVELS.contains(&self.logging.level.as_str()) {
            violations.push(ConfigViolation {
                field: "logging.level",
                message: format!(
                    "无效级别 {:?}，允许值: {}",
                    self.logging.level,
                    LoggingConfig::ALLOWED_LEVELS.join("|")
                ),
            });
        }

        if self.server.port == 0 {
            violations.push(ConfigViolation {
                field: "server.port",
                message: "监听端口不能为 0".to_string(),
            });
        }
        if self.rate_limit.window_secs == 0 {
            violations.push(ConfigViolation {
                field: "rate_limit.window_secs",
                message: "限流窗口不能为 0".to_string(),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigLoadError::Invalid(ConfigViolations(violations)))
        }
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 获取全局配置，未初始化时返回 None（供文档生成等可选消费方使用）。
    pub fn try_global() -> Option<&'static AppConfig> {
        CONFIG.get()
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigLoadError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigLoadError::Parse(ConfigError::Message("配置已经被初始化".to_string())))?;
        Ok(())
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 解析允许的跨域来源列表（逗号分隔，去除空白与空项）。
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors
            .origin
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
