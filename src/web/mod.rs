//! Web 服务器模块
//!
//! 以 HTTP 接口暴露文本处理和 SCENARI 文档处理，文档进度通过 SSE 推送

pub mod config;
pub mod handlers;
pub mod routes;
pub mod types;

pub use config::*;
pub use routes::*;
pub use types::*;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::core::DciaError;
use crate::translation::{OllamaClient, TranslationConfig};

/// Web 服务器
pub struct WebServer {
    config: WebConfig,
    translation: TranslationConfig,
}

impl WebServer {
    /// 创建新的 Web 服务器
    pub fn new(config: WebConfig, translation: TranslationConfig) -> Self {
        Self {
            config,
            translation,
        }
    }

    /// 启动 Web 服务器
    pub async fn start(self) -> Result<(), DciaError> {
        self.config
            .validate()
            .map_err(|e| DciaError::new(&e.to_string()))?;

        let client = OllamaClient::new(self.translation)?;
        if !client.check_health().await {
            tracing::warn!(
                "Ollama 后端不可达: {}，服务仍会启动",
                client.config().ollama_base_url
            );
        }

        let app = create_router(Arc::new(AppState::new(client)));

        let listener = tokio::net::TcpListener::bind(self.config.listen_address())
            .await
            .map_err(|e| DciaError::new(&format!("Failed to bind server: {}", e)))?;

        tracing::info!("Web server starting at http://{}", self.config.listen_address());

        axum::serve(listener, app)
            .await
            .map_err(|e| DciaError::new(&format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// 创建路由器
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // base64 上传会膨胀约三分之一
    let body_limit = app_state
        .client
        .config()
        .max_upload_bytes()
        .saturating_mul(2);

    create_routes()
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
}
