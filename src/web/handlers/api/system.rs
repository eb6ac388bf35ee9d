//! 健康检查和模型列表

use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::web::types::{AppState, HealthResponse, ModelsResponse};

/// 后端健康状态和熔断器状态
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ollama = state.client.check_health().await;
    let breaker = state.client.breaker().snapshot();

    Json(HealthResponse {
        status: if ollama { "ok" } else { "degraded" },
        ollama,
        model: state.client.default_model().to_string(),
        circuit_breaker: breaker.state.to_string(),
        consecutive_failures: breaker.consecutive_failures,
    })
}

/// 可用模型，默认模型排在第一位
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        default_model: state.client.default_model().to_string(),
        models: state.client.available_models().await,
    })
}
