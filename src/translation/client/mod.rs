//! 生成后端客户端模块
//!
//! - `breaker`: 三态熔断器
//! - `prompts`: 任务指令模板
//! - `request`: 按模型能力等级构造请求
//! - `ollama`: 带重试和熔断的 Ollama 客户端
//! - `streaming`: NDJSON 流式响应

pub mod breaker;
pub mod ollama;
pub mod prompts;
pub mod request;
pub mod streaming;

use async_trait::async_trait;

use crate::translation::error::TranslationResult;

pub use breaker::{BreakerPermit, BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use ollama::OllamaClient;
pub use prompts::{translation_system_prompt, Task, TaskPrompt};
pub use request::{
    model_base_name, GenerateRequest, GenerateResponse, GenerationOptions, ModelTier,
    ReducedRequest, StandardRequest,
};
pub use streaming::GenerationStream;

/// 文本生成接口，编排器通过它调用后端
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 执行一个任务并返回生成的文本（已去除首尾空白）
    async fn generate_text(&self, prompt: &TaskPrompt, model: Option<&str>)
        -> TranslationResult<String>;
}
