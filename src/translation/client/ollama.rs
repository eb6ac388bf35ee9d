//! Ollama 生成客户端
//!
//! 缓冲调用带重试和指数退避，流式调用只尝试一次。两条路径共用一个熔断器：
//! 熔断器拒绝时不产生任何网络请求，重试耗尽只向熔断器上报一次失败。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::breaker::CircuitBreaker;
use super::prompts::TaskPrompt;
use super::request::{GenerateRequest, GenerateResponse, ModelTier};
use super::streaming::GenerationStream;
use super::TextGenerator;
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::recovery::{
    Correction, MeetingSummary, Reformulation, StructuredOutput,
};

#[derive(Debug, Default, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    #[serde(default)]
    name: Option<String>,
}

/// Ollama 客户端
pub struct OllamaClient {
    http: reqwest::Client,
    config: TranslationConfig,
    breaker: Arc<CircuitBreaker>,
}

impl OllamaClient {
    /// 创建新的客户端
    pub fn new(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;

        // 代理只来自配置（配置层已读取 HTTP_PROXY / HTTPS_PROXY）
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout())
            .no_proxy();

        if let Some(proxy) = &config.http_proxy {
            let proxy = reqwest::Proxy::http(proxy).map_err(|e| {
                TranslationError::ConfigError(format!("invalid HTTP proxy '{}': {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }
        if let Some(proxy) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(proxy).map_err(|e| {
                TranslationError::ConfigError(format!("invalid HTTPS proxy '{}': {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build().map_err(|e| {
            TranslationError::ConfigError(format!("failed to build HTTP client: {}", e))
        })?;

        let breaker = Arc::new(CircuitBreaker::from_config(&config));

        tracing::info!(
            "Ollama 客户端: {} (模型 {}, 超时 {:?}, 重试 {})",
            config.ollama_base_url,
            config.ollama_model,
            config.timeout(),
            config.max_retries
        );

        Ok(Self {
            http,
            config,
            breaker,
        })
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn default_model(&self) -> &str {
        &self.config.ollama_model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.ollama_base_url.trim_end_matches('/'), path)
    }

    /// 模型的能力等级
    pub fn tier_for(&self, model: &str) -> ModelTier {
        ModelTier::detect(model, &self.config.reduced_model_prefixes)
    }

    /// 为任务构造请求，未指定模型时使用默认模型
    pub fn build_request(&self, prompt: &TaskPrompt, model: Option<&str>) -> GenerateRequest {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.ollama_model.as_str());
        GenerateRequest::build(model, self.tier_for(model), prompt)
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(attempt as u32);
        self.config.retry_base_delay().saturating_mul(factor)
    }

    /// 缓冲调用：带重试、退避和熔断
    pub async fn generate(&self, request: &GenerateRequest) -> TranslationResult<String> {
        let Some(permit) = self.breaker.acquire() else {
            tracing::warn!("熔断器打开，跳过调用 (模型 {})", request.model());
            return Err(TranslationError::BackendUnavailable(format!(
                "circuit breaker open for {}",
                self.config.ollama_base_url
            )));
        };

        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            match self.attempt(request).await {
                Ok(text) => {
                    tracing::debug!("第 {}/{} 次调用成功", attempt + 1, max_attempts);
                    permit.success();
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!("第 {}/{} 次调用失败: {}", attempt + 1, max_attempts, e);
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < max_attempts {
                let delay = self.backoff_delay(attempt);
                tracing::info!("等待 {:?} 后重试", delay);
                tokio::time::sleep(delay).await;
            }
        }

        permit.failure();
        tracing::error!("生成调用在 {} 次尝试后失败: {}", max_attempts, last_error);

        Err(TranslationError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    /// 单次尝试
    async fn attempt(&self, request: &GenerateRequest) -> TranslationResult<String> {
        let response = self
            .http
            .post(self.endpoint("/api/generate"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TranslationError::TransientBackendFailure(format!(
                "backend returned HTTP {}",
                status
            )));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body.response.trim();
        if text.is_empty() {
            return Err(TranslationError::TransientBackendFailure(
                "empty response from backend".to_string(),
            ));
        }

        Ok(text.to_string())
    }

    /// 流式调用，不重试
    pub async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> TranslationResult<GenerationStream> {
        let Some(permit) = self.breaker.acquire() else {
            tracing::warn!("熔断器打开，跳过流式调用 (模型 {})", request.model());
            return Err(TranslationError::BackendUnavailable(format!(
                "circuit breaker open for {}",
                self.config.ollama_base_url
            )));
        };

        let request = request.streaming();
        let response = match self
            .http
            .post(self.endpoint("/api/generate"))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                permit.failure();
                tracing::warn!("流式调用失败: {}", e);
                return Err(e.into());
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            permit.failure();
            tracing::warn!("流式调用返回 HTTP {}", status);
            return Err(TranslationError::TransientBackendFailure(format!(
                "backend returned HTTP {}",
                status
            )));
        }

        tracing::debug!("开始接收流式响应 (模型 {})", request.model());
        Ok(GenerationStream::new(response.bytes_stream(), permit))
    }

    /// 检查后端是否可用
    pub async fn check_health(&self) -> bool {
        match self
            .http
            .get(self.endpoint("/api/tags"))
            .timeout(constants::HEALTH_CHECK_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::error!("Ollama 健康检查失败: {}", e);
                false
            }
        }
    }

    /// 后端已安装的模型（去重，保持后端顺序）
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::error!("获取模型列表失败: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_models(&self) -> TranslationResult<Vec<String>> {
        let response = self
            .http
            .get(self.endpoint("/api/tags"))
            .timeout(constants::LIST_MODELS_TIMEOUT)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TranslationError::TransientBackendFailure(format!(
                "backend returned HTTP {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await?;
        let mut seen = HashSet::new();
        Ok(tags
            .models
            .into_iter()
            .filter_map(|m| m.name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && seen.insert(name.clone()))
            .collect())
    }

    /// 可选模型列表，默认模型排在第一位
    pub async fn available_models(&self) -> Vec<String> {
        let default_model = self.default_model().to_string();
        let mut models: Vec<String> = self
            .list_models()
            .await
            .into_iter()
            .filter(|m| *m != default_model)
            .collect();
        models.insert(0, default_model);
        models
    }

    /// 翻译文本
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        model: Option<&str>,
    ) -> TranslationResult<String> {
        let prompt = TaskPrompt::translate(text, source_lang, target_lang)?;
        self.generate(&self.build_request(&prompt, model)).await
    }

    /// 校对文本
    pub async fn correct(&self, text: &str, model: Option<&str>) -> TranslationResult<Correction> {
        let raw = self.generate(&self.build_request(&TaskPrompt::correct(text), model)).await?;
        Correction::from_raw(&raw)
    }

    /// 改写文本
    pub async fn reformulate(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> TranslationResult<Reformulation> {
        let raw = self
            .generate(&self.build_request(&TaskPrompt::reformulate(text), model))
            .await?;
        Reformulation::from_raw(&raw)
    }

    /// 生成会议纪要
    pub async fn summarize(
        &self,
        notes: &str,
        model: Option<&str>,
    ) -> TranslationResult<MeetingSummary> {
        let raw = self
            .generate(&self.build_request(&TaskPrompt::summarize(notes), model))
            .await?;
        MeetingSummary::from_raw(&raw)
    }

    /// 分批顺序翻译，失败的条目为 `None`
    pub async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
        model: Option<&str>,
        batch_size: Option<usize>,
    ) -> Vec<Option<String>> {
        let batch_size = batch_size.unwrap_or(self.config.batch_size).max(1);
        let mut results = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
            tracing::info!("翻译第 {} 批 ({} 条)", batch_index + 1, batch.len());
            for text in batch {
                match self.translate(text, source_lang, target_lang, model).await {
                    Ok(translated) => results.push(Some(translated)),
                    Err(e) => {
                        tracing::warn!("批量翻译条目失败: {}", e);
                        results.push(None);
                    }
                }
            }
        }

        results
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate_text(
        &self,
        prompt: &TaskPrompt,
        model: Option<&str>,
    ) -> TranslationResult<String> {
        self.generate(&self.build_request(prompt, model)).await
    }
}
