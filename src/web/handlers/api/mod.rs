//! API 处理器

pub mod documents;
pub mod system;
pub mod text;

pub use documents::*;
pub use system::*;
pub use text::*;

use axum::{http::StatusCode, response::Json};

use crate::translation::error::{ErrorCategory, TranslationError};

/// API 错误响应
pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// 将库错误映射为 HTTP 状态码和 JSON 错误体
pub fn error_response(error: TranslationError) -> ApiError {
    let status = match error.category() {
        ErrorCategory::Input | ErrorCategory::Parsing => StatusCode::BAD_REQUEST,
        ErrorCategory::Availability => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Network | ErrorCategory::UpstreamData => StatusCode::BAD_GATEWAY,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::Configuration
        | ErrorCategory::Serialization
        | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("请求处理失败: {}", error);
    } else {
        tracing::warn!("请求被拒绝: {}", error);
    }

    (status, Json(serde_json::json!({ "error": error.to_string() })))
}
