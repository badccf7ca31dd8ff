use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::ApiError;

/// 会话令牌声明
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 主体标识（用户 ID）
    pub sub: String,
    /// 令牌唯一标识
    pub jti: String,
    /// 签发时刻（Unix 秒）
    pub iat: i64,
    /// 过期时刻（Unix 秒）
    pub exp: i64,
}

/// 身份令牌服务：签发与验证访问/刷新令牌。
///
/// 只负责令牌机制本身，不做授权决策。访问令牌与刷新令牌
/// 使用相互独立的密钥对，二者不可互换验证。
#[derive(Clone)]
pub struct TokenService {
    inner: Arc<TokenKeys>,
}

struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_ttl_secs: u64,
}

impl TokenService {
    /// 从配置构建服务。密钥长度在配置加载阶段已经校验过，
    /// 这里只防御空密钥的非法直构。
    pub fn from_config(jwt: &JwtConfig) -> Result<Self, ApiError> {
        if jwt.secret.is_empty() || jwt.refresh_secret.is_empty() {
            return Err(ApiError::Internal("令牌签名密钥为空".to_string()));
        }
        Ok(Self {
            inner: Arc::new(TokenKeys {
                access_encoding: EncodingKey::from_secret(jwt.secret.as_bytes()),
                access_decoding: DecodingKey::from_secret(jwt.secret.as_bytes()),
                access_ttl_secs: jwt.expires_in_secs,
                refresh_encoding: EncodingKey::from_secret(jwt.refresh_secret.as_bytes()),
                refresh_decoding: DecodingKey::from_secret(jwt.refresh_secret.as_bytes()),
                refresh_ttl_secs: jwt.refresh_expires_in_secs,
            }),
        })
    }

    /// 签发访问令牌（主密钥对）。
    pub fn issue_access(&self, subject: &str) -> Result<String, ApiError> {
        issue(
            &self.inner.access_encoding,
            subject,
            self.inner.access_ttl_secs,
        )
    }

    /// 签发刷新令牌（独立密钥对）。
    pub fn issue_refresh(&self, subject: &str) -> Result<String, ApiError> {
        issue(
            &self.inner.refresh_encoding,
            subject,
            self.inner.refresh_ttl_secs,
        )
    }

    /// 验证访问令牌。无效或过期一律归为 401，不透出具体原因。
    pub fn verify_access(&self, token: &str) -> Result<Claims, ApiError> {
        verify(&self.inner.access_decoding, token)
    }

    /// 验证刷新令牌。
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, ApiError> {
        verify(&self.inner.refresh_decoding, token)
    }
}

fn issue(key: &EncodingKey, subject: &str, ttl_secs: u64) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: subject.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + ttl_secs as i64,
    };
    jsonwebtoken::encode(&jsonwebtoken::Header::new(Algorithm::HS256), &claims, key)
        .map_err(|e| ApiError::Internal(format!("签发令牌失败: {e}")))
}

fn verify(key: &DecodingKey, token: &str) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<Claims>(token, key, &validation)
        .map_err(|_| ApiError::Unauthorized)?;
    Ok(data.claims)
}
