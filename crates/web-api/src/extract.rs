use axum::{extract::rejection::JsonRejection, extract::FromRequest, http::StatusCode};

use crate::error::ApiError;

/// 与 `axum::Json` 相同，但请求体缺失或格式错误时返回统一的 400 `ApiError`。
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // 解析细节只进日志，不回显给客户端
        tracing::debug!(
            status = %rejection.status(),
            error = %rejection.body_text(),
            "request body rejected"
        );
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_BODY",
            "request body is missing or malformed",
        )
    }
}
