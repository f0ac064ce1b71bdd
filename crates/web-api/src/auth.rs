//! JWT 认证模块
//!
//! 提供 token 签发、校验，以及按 token 加载当前用户的提取器。

use application::{ApplicationError, ChatDto, UserDto};
use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use config::JwtConfig;
use domain::{User, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingToken,
    #[error("invalid authorization header format")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token key id does not match")]
    KeyIdMismatch,
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        tracing::warn!(error = %error, "bearer token rejected");
        ApiError::unauthorized(error.to_string())
    }
}

/// JWT Token 服务
///
/// 只签发和接受 HS256；配置了 `key_id` 时写入头部 `kid`，校验时要求一致。
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// 生成 JWT token
    pub fn generate_token(&self, user_id: UserId) -> Result<String, ApiError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            user_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.config.key_id.clone();

        encode(&header, &claims, &self.encoding_key).map_err(ApiError::internal_server_error)
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        if let Some(expected) = &self.config.key_id {
            if data.header.kid.as_deref() != Some(expected.as_str()) {
                return Err(AuthError::KeyIdMismatch);
            }
        }

        Ok(data.claims)
    }

    /// 从 headers 中提取和验证 token
    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MalformedHeader)?;

        let claims = self.verify_token(token)?;
        Ok(claims.user_id)
    }
}

/// 已认证的当前用户，每个请求都从存储中重新读取。
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = state
            .jwt_service
            .extract_user_from_headers(&parts.headers)?;

        match state.user_service.find_by_id(user_id).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(ApplicationError::NotFound) => {
                tracing::warn!(user_id = %user_id, "token refers to unknown user");
                Err(ApiError::unauthorized("unknown user"))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// 注册和登录的响应：用户资料、所在聊天室和新签发的 token
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub user: UserDto,
    pub chats: Vec<ChatDto>,
    pub token: String,
}
