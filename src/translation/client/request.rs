//! 请求构造
//!
//! 标准模型接收 `system` 与 `options` 字段；能力受限的模型会拒绝这些字段，
//! 指令改为并入 `prompt` 正文。两种请求分别用独立的类型表示。

use serde::{Deserialize, Serialize};

use super::prompts::TaskPrompt;
use crate::translation::config::constants;

/// 后端模型能力等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Standard,
    Reduced,
}

impl ModelTier {
    /// 按模型名约定判断能力等级
    ///
    /// 取注册表路径之后、`:` 标签之前的基础名，小写后与前缀列表比较。
    pub fn detect<S: AsRef<str>>(model: &str, reduced_prefixes: &[S]) -> Self {
        let base = model_base_name(model);
        if reduced_prefixes
            .iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .any(|p| !p.is_empty() && base.starts_with(&p))
        {
            ModelTier::Reduced
        } else {
            ModelTier::Standard
        }
    }
}

/// `registry/library/gemma2:2b` -> `gemma2`
pub fn model_base_name(model: &str) -> String {
    let name = model.trim().rsplit('/').next().unwrap_or_default();
    let name = name.split(':').next().unwrap_or_default();
    name.to_lowercase()
}

/// 采样参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationOptions {
    pub fn for_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            top_p: constants::DEFAULT_TOP_P,
        }
    }
}

/// 标准请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub stream: bool,
    pub options: GenerationOptions,
}

/// 受限请求：只有模型、正文和流式标志
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReducedRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// `/api/generate` 请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerateRequest {
    Standard(StandardRequest),
    Reduced(ReducedRequest),
}

impl GenerateRequest {
    /// 按能力等级构造请求
    pub fn build(model: &str, tier: ModelTier, prompt: &TaskPrompt) -> Self {
        match tier {
            ModelTier::Standard => GenerateRequest::Standard(StandardRequest {
                model: model.to_string(),
                prompt: prompt.prompt.clone(),
                system: prompt.system.clone(),
                stream: false,
                options: GenerationOptions::for_temperature(prompt.task.temperature()),
            }),
            ModelTier::Reduced => GenerateRequest::Reduced(ReducedRequest {
                model: model.to_string(),
                prompt: prompt.folded(),
                stream: false,
            }),
        }
    }

    pub fn streaming(mut self) -> Self {
        match &mut self {
            GenerateRequest::Standard(r) => r.stream = true,
            GenerateRequest::Reduced(r) => r.stream = true,
        }
        self
    }

    pub fn model(&self) -> &str {
        match self {
            GenerateRequest::Standard(r) => &r.model,
            GenerateRequest::Reduced(r) => &r.model,
        }
    }

    pub fn is_streaming(&self) -> bool {
        match self {
            GenerateRequest::Standard(r) => r.stream,
            GenerateRequest::Reduced(r) => r.stream,
        }
    }

    pub fn tier(&self) -> ModelTier {
        match self {
            GenerateRequest::Standard(_) => ModelTier::Standard,
            GenerateRequest::Reduced(_) => ModelTier::Reduced,
        }
    }
}

/// `/api/generate` 响应，流式时每行一条
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PREFIXES: &[&str] = &["gemma", "phi"];

    #[test]
    fn test_tier_detection() {
        assert_eq!(ModelTier::detect("gemma2:2b", PREFIXES), ModelTier::Reduced);
        assert_eq!(ModelTier::detect("Phi3:latest", PREFIXES), ModelTier::Reduced);
        assert_eq!(
            ModelTier::detect("registry.ollama.ai/library/gemma:7b", PREFIXES),
            ModelTier::Reduced
        );
        assert_eq!(
            ModelTier::detect("mistral-small:latest", PREFIXES),
            ModelTier::Standard
        );
        assert_eq!(ModelTier::detect("gemma", &[] as &[&str]), ModelTier::Standard);
    }

    #[test]
    fn test_standard_request_shape() {
        let prompt = TaskPrompt::translate("Bonjour", "fr", "en").unwrap();
        let request = GenerateRequest::build("mistral-small:latest", ModelTier::Standard, &prompt);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "mistral-small:latest");
        assert_eq!(value["prompt"], "Bonjour");
        assert_eq!(value["stream"], false);
        assert!(value["system"].as_str().unwrap().starts_with("You are a translator"));
        assert!((value["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!((value["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_reduced_request_omits_auxiliary_fields() {
        for prompt in [
            TaskPrompt::translate("Bonjour", "fr", "en").unwrap(),
            TaskPrompt::correct("texte"),
            TaskPrompt::reformulate("texte"),
            TaskPrompt::summarize("notes"),
        ] {
            let request = GenerateRequest::build("gemma2:2b", ModelTier::Reduced, &prompt);
            let value = serde_json::to_value(&request).unwrap();
            let object = value.as_object().unwrap();

            assert!(!object.contains_key("system"));
            assert!(!object.contains_key("options"));
            assert_eq!(value["prompt"], json!(format!("{}\n\n{}", prompt.system, prompt.prompt)));
        }
    }

    #[test]
    fn test_streaming_flag() {
        let prompt = TaskPrompt::correct("texte");
        let request = GenerateRequest::build("m", ModelTier::Standard, &prompt).streaming();
        assert!(request.is_streaming());
        assert_eq!(serde_json::to_value(&request).unwrap()["stream"], true);
    }
}
