//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

use crate::core::DciaError;
use crate::parsers::XmlError;

/// 诊断片段最大长度
pub const SNIPPET_MAX_CHARS: usize = 500;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// 输入文档无法解析
    #[error("XML parse error: {0}")]
    ParseError(String),

    /// 不支持的语言对，不会发起后端调用
    #[error("unsupported language pair: {source_lang} -> {target_lang}")]
    UnsupportedLanguagePair {
        source_lang: String,
        target_lang: String,
    },

    /// 熔断器打开，快速失败
    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// 单次调用的暂时性失败（超时、5xx、传输错误、空响应）
    #[error("transient backend failure: {0}")]
    TransientBackendFailure(String),

    /// 重试耗尽
    #[error("generation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// 超时错误
    #[error("operation timed out: {0}")]
    TimeoutError(String),

    /// 结构化输出恢复失败
    #[error("malformed structured output: {message} (snippet: {snippet})")]
    MalformedStructuredOutput { message: String, snippet: String },

    /// 序列化错误
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// 输入验证错误
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 内部错误
    #[error("internal error: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::TransientBackendFailure(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::BackendUnavailable(_) => false, // 等待熔断器冷却
            TranslationError::RetriesExhausted { .. } => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::UnsupportedLanguagePair { .. } => false,
            TranslationError::MalformedStructuredOutput { .. } => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::UnsupportedLanguagePair { .. } => ErrorSeverity::Info,
            TranslationError::BackendUnavailable(_) => ErrorSeverity::Warning,
            TranslationError::TransientBackendFailure(_) => ErrorSeverity::Warning,
            TranslationError::RetriesExhausted { .. } => ErrorSeverity::Error,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::MalformedStructuredOutput { .. } => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::UnsupportedLanguagePair { .. } => ErrorCategory::Input,
            TranslationError::BackendUnavailable(_) => ErrorCategory::Availability,
            TranslationError::TransientBackendFailure(_) => ErrorCategory::Network,
            TranslationError::RetriesExhausted { .. } => ErrorCategory::Network,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::MalformedStructuredOutput { .. } => ErrorCategory::UpstreamData,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 是否只影响单个片段（记录后继续处理下一个片段）
    pub fn is_segment_level(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Availability
                | ErrorCategory::UpstreamData
        )
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::ConfigError(msg)
            | TranslationError::ParseError(msg)
            | TranslationError::BackendUnavailable(msg)
            | TranslationError::TransientBackendFailure(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::InternalError(msg) => {
                *msg = format!("{} (context: {})", msg, context);
            }
            TranslationError::RetriesExhausted { last_error, .. } => {
                *last_error = format!("{} (context: {})", last_error, context);
            }
            TranslationError::MalformedStructuredOutput { message, .. } => {
                *message = format!("{} (context: {})", message, context);
            }
            TranslationError::UnsupportedLanguagePair { .. } => {}
        }

        self
    }
}

/// 截断诊断片段（按字符计）
pub fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_MAX_CHARS).collect()
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Availability,
    Input,
    Timeout,
    Parsing,
    UpstreamData,
    Serialization,
    Internal,
}

impl From<XmlError> for TranslationError {
    fn from(error: XmlError) -> Self {
        match error {
            XmlError::Parse(msg) => TranslationError::ParseError(msg),
            XmlError::Serialize(msg) => TranslationError::SerializationError(msg),
        }
    }
}

impl From<quick_xml::Error> for TranslationError {
    fn from(error: quick_xml::Error) -> Self {
        TranslationError::ParseError(error.to_string())
    }
}

impl From<TranslationError> for DciaError {
    fn from(error: TranslationError) -> Self {
        DciaError::new(&error.to_string())
    }
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::InternalError(format!("I/O error: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON error: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML parse error: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else {
            TranslationError::TransientBackendFailure(error.to_string())
        }
    }
}

impl From<zip::result::ZipError> for TranslationError {
    fn from(error: zip::result::ZipError) -> Self {
        TranslationError::SerializationError(format!("archive error: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("async operation timed out: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        let category = error.category();
        *self.by_category.entry(category).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// 获取错误率
    pub fn error_rate(&self, total_operations: usize) -> f64 {
        if total_operations == 0 {
            0.0
        } else {
            self.total_errors as f64 / total_operations as f64
        }
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error<C: fmt::Display>(context: C, error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("{}: {}", context, error),
            ErrorSeverity::Warning => tracing::warn!("{}: {}", context, error),
            ErrorSeverity::Error => tracing::error!("{}: {}", context, error),
            ErrorSeverity::Critical => tracing::error!("{} (严重): {}", context, error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }

    /// 创建结构化输出错误，附带截断后的原文片段
    pub fn malformed_output<T: fmt::Display>(msg: T, raw: &str) -> TranslationError {
        TranslationError::MalformedStructuredOutput {
            message: msg.to_string(),
            snippet: snippet(raw),
        }
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InternalError(msg.to_string())
    }
}
