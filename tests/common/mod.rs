// 集成测试公共模块
//
// 提供模拟生成器、示例文档和进程内的模拟 Ollama 后端

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use dcia::translation::client::{TaskPrompt, TextGenerator};
use dcia::translation::config::constants::SCENARI_CORE_NS;
use dcia::translation::{TranslationConfig, TranslationError, TranslationResult};

type ReplyFn = dyn Fn(&TaskPrompt) -> TranslationResult<String> + Send + Sync;

/// 记录调用的模拟生成器
pub struct MockGenerator {
    reply: Box<ReplyFn>,
    calls: Mutex<Vec<TaskPrompt>>,
}

impl MockGenerator {
    /// 每次调用返回同一段文本
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::with(move |_| Ok(text.clone()))
    }

    /// 返回 `[EN] 原文`
    pub fn tagging() -> Self {
        Self::with(|prompt| Ok(format!("[EN] {}", prompt.prompt)))
    }

    /// 正文包含 `marker` 的调用失败
    pub fn failing_on(marker: &str) -> Self {
        let marker = marker.to_string();
        Self::with(move |prompt| {
            if prompt.prompt.contains(&marker) {
                Err(TranslationError::RetriesExhausted {
                    attempts: 3,
                    last_error: "HTTP 500".to_string(),
                })
            } else {
                Ok(format!("[EN] {}", prompt.prompt))
            }
        })
    }

    pub fn with<F>(reply: F) -> Self
    where
        F: Fn(&TaskPrompt) -> TranslationResult<String> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<TaskPrompt> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate_text(
        &self,
        prompt: &TaskPrompt,
        _model: Option<&str>,
    ) -> TranslationResult<String> {
        self.calls.lock().unwrap().push(prompt.clone());
        (self.reply)(prompt)
    }
}

/// 示例文档
pub struct XmlSamples;

impl XmlSamples {
    /// 由段落组成的 SCENARI 文档
    pub fn paragraphs(paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<sc:para>{}</sc:para>", p))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<sc:item xmlns:sc=\"{}\" xml:lang=\"fr\"><sc:content>{}</sc:content></sc:item>",
            SCENARI_CORE_NS, body
        )
    }

    /// 包含标题、忽略元素和行内样式的文档
    pub fn mixed() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sc:item xmlns:sc="{ns}" xmlns:sp="http://www.utc.fr/ics/scenari/v3/primitive">
  <sc:title>Introduction</sc:title>
  <sc:content>
    <sc:para>Le cours commence ici.</sc:para>
    <sc:para>Texte <sc:inlineStyle role="emp">important</sc:inlineStyle> ici.</sc:para>
    <sc:code><sc:para>let x = 1;</sc:para></sc:code>
    <sc:para/>
    <sp:txt>Note finale</sp:txt>
  </sc:content>
</sc:item>"#,
            ns = SCENARI_CORE_NS
        )
    }

    /// 声明为 ISO-8859-1 的文档
    pub fn latin1(text: &str) -> Vec<u8> {
        let mut bytes = format!(
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<sc:item xmlns:sc=\"{}\"><sc:para>",
            SCENARI_CORE_NS
        )
        .into_bytes();
        bytes.extend(text.chars().map(|c| c as u32 as u8));
        bytes.extend_from_slice(b"</sc:para></sc:item>");
        bytes
    }
}

/// 测试用配置：短退避、短超时
pub fn fast_config(base_url: &str) -> TranslationConfig {
    TranslationConfig {
        retry_base_delay_ms: 10,
        timeout_secs: 5,
        ..TranslationConfig::with_base_url(base_url)
    }
}

/// 模拟后端的一次应答
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 + `{"response": ..., "done": true}`
    Text(String),
    /// 指定状态码
    Status(u16),
    /// 200 + NDJSON 正文
    Stream(Vec<String>),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        MockReply::Text(text.to_string())
    }

    /// 每个片段一条记录，最后一条 `done`
    pub fn stream(fragments: &[&str]) -> Self {
        let mut lines: Vec<String> = fragments
            .iter()
            .map(|f| json!({ "response": f, "done": false }).to_string())
            .collect();
        lines.push(json!({ "response": "", "done": true }).to_string());
        MockReply::Stream(lines)
    }
}

struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    requests: Mutex<Vec<Value>>,
    models: Vec<String>,
}

/// 进程内的模拟 Ollama 后端
pub struct MockOllama {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockOllama {
    /// 按顺序返回 `replies`，用完后一直返回 `fallback`
    pub async fn start(replies: Vec<MockReply>, fallback: MockReply) -> Self {
        Self::start_with_models(replies, fallback, Vec::new()).await
    }

    pub async fn start_with_models(
        replies: Vec<MockReply>,
        fallback: MockReply,
        models: Vec<&str>,
    ) -> Self {
        let state = Arc::new(MockState {
            replies: Mutex::new(replies.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
            models: models.into_iter().map(str::to_string).collect(),
        });

        let app = Router::new()
            .route("/api/generate", post(generate))
            .route("/api/tags", get(tags))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// 收到的请求体
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn generate(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(body);
    let reply = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| state.fallback.clone());

    match reply {
        MockReply::Text(text) => Json(json!({ "response": text, "done": true })).into_response(),
        MockReply::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "backend error").into_response()
        }
        MockReply::Stream(lines) => {
            let mut body = lines.join("\n");
            body.push('\n');
            ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
        }
    }
}

async fn tags(State(state): State<Arc<MockState>>) -> Json<Value> {
    let models: Vec<Value> = state.models.iter().map(|m| json!({ "name": m })).collect();
    Json(json!({ "models": models }))
}
