//! Web 模块的数据类型定义

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::translation::core::DocumentPreview;
use crate::translation::{DocumentTranslator, OllamaClient};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<OllamaClient>,
    pub translator: DocumentTranslator,
}

impl AppState {
    pub fn new(client: OllamaClient) -> Self {
        let client = Arc::new(client);
        Self {
            translator: DocumentTranslator::new(client.clone()),
            client,
        }
    }

    pub fn max_upload_mb(&self) -> usize {
        self.client.config().max_upload_mb
    }
}

fn default_source_lang() -> String {
    "fr".to_string()
}

fn default_target_lang() -> String {
    "en".to_string()
}

/// 文本翻译请求
#[derive(Debug, Deserialize)]
pub struct TranslateTextRequest {
    pub text: String,
    #[serde(default = "default_source_lang")]
    pub source_lang: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// 文本翻译响应
#[derive(Debug, Serialize)]
pub struct TranslateTextResponse {
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub model: String,
}

/// 校对或改写请求
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// 会议纪要请求
#[derive(Debug, Deserialize)]
pub struct MeetingSummaryRequest {
    pub notes: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// 上传的文档，内容以 base64 编码
#[derive(Debug, Deserialize)]
pub struct DocumentPayload {
    pub filename: String,
    pub content_base64: String,
}

/// 文档预览请求
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub documents: Vec<DocumentPayload>,
}

/// 文档预览响应
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub files: Vec<DocumentPreview>,
    pub total_elements: usize,
}

/// 文档任务
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentTaskKind {
    #[default]
    Translate,
    Correct,
    Reformulate,
}

/// 文档处理请求，进度以 SSE 返回
#[derive(Debug, Deserialize)]
pub struct DocumentTranslateRequest {
    pub documents: Vec<DocumentPayload>,
    #[serde(default = "default_source_lang")]
    pub source_lang: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    #[serde(default)]
    pub task: DocumentTaskKind,
    #[serde(default)]
    pub model: Option<String>,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ollama: bool,
    pub model: String,
    pub circuit_breaker: String,
    pub consecutive_failures: u32,
}

/// 模型列表响应
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default_model: String,
    pub models: Vec<String>,
}
