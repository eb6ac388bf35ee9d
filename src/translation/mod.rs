//! 翻译模块
//!
//! 提供 XML 文档的片段级处理，采用清晰的模块化架构：
//! - **pipeline**: 片段收集、回填和序列化
//! - **client**: 带重试、熔断和流式响应的生成后端客户端
//! - **recovery**: 从模型自由文本中恢复 JSON 对象
//! - **core**: 文档处理服务、报告和请求校验
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use dcia::translation::{OllamaClient, TranslationConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new(TranslationConfig::default())?;
//! let english = client.translate("Bonjour le monde", "fr", "en", None).await?;
//! println!("{}", english);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 生成后端客户端模块 - 熔断器、请求构造、重试和流式响应
pub mod client;

/// 配置管理模块 - 后端地址、重试策略、熔断参数和提取选项
pub mod config;

/// 核心处理模块 - 文档处理服务、翻译报告和请求校验
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 片段处理管道模块 - 收集可翻译片段并回填结果
pub mod pipeline;

/// 结构化输出恢复模块
pub mod recovery;

// ============================================================================
// 核心API导出
// ============================================================================

pub use client::{CircuitBreaker, CircuitState, GenerationStream, OllamaClient, TaskPrompt, TextGenerator};
pub use config::{constants, ConfigManager, SegmentOrder, TranslationConfig};
pub use core::{
    BatchEvent, DocumentOptions, DocumentResult, DocumentTranslator, InputDocument,
    SegmentTask, TranslationProgress, TranslationReport,
};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use pipeline::{count_translatable_elements, ExtractionMode, Segment, SegmentCollector};
pub use recovery::{recover, Correction, MeetingSummary, Reformulation, StructuredOutput};

/// 生成示例配置文件
pub fn generate_example_config(path: &str) -> Result<(), crate::core::DciaError> {
    ConfigManager::generate_example_config(path)
        .map_err(|e| crate::core::DciaError::new(&format!("failed to write example config: {}", e)))?;
    tracing::info!("已生成示例配置文件: {}", path);
    Ok(())
}
