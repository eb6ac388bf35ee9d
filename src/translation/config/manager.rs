//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{helpers, TranslationError, TranslationResult};

/// 通用提取器的输出顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentOrder {
    /// 按允许列表中的标签顺序分组，组内按文档顺序
    #[default]
    TagThenDocument,
    /// 严格文档顺序
    Document,
}

/// 翻译配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 后端配置
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub timeout_secs: u64,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,

    // 重试与熔断
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,

    // 批次与上传
    pub batch_size: usize,
    pub max_upload_mb: usize,

    // 文档处理
    pub segment_order: SegmentOrder,
    pub pretty_print: bool,

    // 模型能力
    pub reduced_model_prefixes: Vec<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: constants::DEFAULT_OLLAMA_BASE_URL.to_string(),
            ollama_model: constants::DEFAULT_MODEL.to_string(),
            timeout_secs: constants::DEFAULT_TIMEOUT.as_secs(),
            http_proxy: None,
            https_proxy: None,

            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
            failure_threshold: constants::DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_secs: constants::DEFAULT_RESET_TIMEOUT.as_secs(),

            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_upload_mb: constants::DEFAULT_MAX_UPLOAD_MB,

            segment_order: SegmentOrder::default(),
            pretty_print: false,

            reduced_model_prefixes: constants::REDUCED_MODEL_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl TranslationConfig {
    /// 创建指向指定后端的默认配置
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            ollama_base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.max_retries == 0 {
            return Err(helpers::config_error("max_retries must be at least 1"));
        }

        if self.timeout_secs == 0 {
            return Err(helpers::config_error("timeout_secs must be greater than 0"));
        }

        if self.failure_threshold == 0 {
            return Err(helpers::config_error("failure_threshold must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(helpers::config_error("batch_size must be greater than 0"));
        }

        if self.ollama_model.trim().is_empty() {
            return Err(helpers::config_error("ollama_model cannot be empty"));
        }

        url::Url::parse(&self.ollama_base_url).map_err(|e| {
            helpers::config_error(format!(
                "invalid ollama_base_url '{}': {}",
                self.ollama_base_url, e
            ))
        })?;

        Ok(())
    }

    /// 应用环境变量覆盖（仅覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{ollama, proxy, translation, EnvVar};

        fn apply<T>(name: &str, value: Option<crate::env::EnvResult<T>>, target: &mut T) {
            match value {
                Some(Ok(v)) => *target = v,
                Some(Err(e)) => tracing::warn!("忽略无效的环境变量 {}: {}", name, e),
                None => {}
            }
        }

        apply(
            ollama::BaseUrl::NAME,
            ollama::BaseUrl::lookup(),
            &mut self.ollama_base_url,
        );
        apply(ollama::Model::NAME, ollama::Model::lookup(), &mut self.ollama_model);

        let mut timeout = self.timeout();
        apply(ollama::Timeout::NAME, ollama::Timeout::lookup(), &mut timeout);
        self.timeout_secs = timeout.as_secs();

        apply(
            ollama::MaxRetries::NAME,
            ollama::MaxRetries::lookup(),
            &mut self.max_retries,
        );
        apply(
            translation::BatchSize::NAME,
            translation::BatchSize::lookup(),
            &mut self.batch_size,
        );
        apply(
            translation::MaxUploadMb::NAME,
            translation::MaxUploadMb::lookup(),
            &mut self.max_upload_mb,
        );

        if let Some(Ok(p)) = proxy::HttpProxy::lookup() {
            self.http_proxy = Some(p);
        }
        if let Some(Ok(p)) = proxy::HttpsProxy::lookup() {
            self.https_proxy = Some(p);
        }

        tracing::debug!("后端地址: {}, 模型: {}", self.ollama_base_url, self.ollama_model);
    }

    /// 转换为Duration类型
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件创建（仍然应用环境变量覆盖）
    pub fn from_file(path: &str) -> TranslationResult<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 从文件加载配置
    fn load_config() -> TranslationResult<TranslationConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        // 查找配置文件
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("failed to read config file {}: {}", path, e))
        })?;

        // 尝试TOML格式
        if path.ends_with(".toml") {
            Ok(toml::from_str(&content)?)
        } else {
            // 尝试JSON格式
            serde_json::from_str(&content).map_err(|e| {
                TranslationError::ConfigError(format!("failed to parse JSON config: {}", e))
            })
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("failed to write config: {}", e)))?;

        Ok(())
    }
}
