//! Web 路由定义

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::{handlers::*, types::AppState};

/// 创建路由结构
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/models", get(list_models))
        // 文本级操作
        .route("/api/translate-text", post(translate_text))
        .route("/api/correct-text", post(correct_text))
        .route("/api/reformulate-text", post(reformulate_text))
        .route("/api/meeting-summary", post(meeting_summary))
        // SCENARI 文档
        .route("/api/scenari/preview", post(preview))
        .route("/api/scenari/translate", post(translate_documents))
}
