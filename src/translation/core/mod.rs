//! 文档处理核心模块
//!
//! 把片段收集、生成客户端、结构化输出恢复和回填串成一条管道，
//! 为命令行和 Web 层提供统一的文档处理接口。
//!
//! ## 模块依赖关系
//!
//! ```text
//! DocumentTranslator (service.rs)
//!     ├── SegmentCollector (pipeline/collector.rs)
//!     ├── TextGenerator → OllamaClient (client/ollama.rs)
//!     │       └── CircuitBreaker (client/breaker.rs)
//!     ├── recover (recovery.rs)
//!     ├── reinject / serialize (pipeline/reinject.rs)
//!     └── package_results (builders/archive.rs)
//! ```

pub mod report;
pub mod service;
pub mod validation;

// 重新导出核心类型和接口
pub use report::{SegmentReport, TranslationReport};
pub use service::{
    preview_documents, BatchEvent, CompletionEvent, DocumentOptions, DocumentPreview,
    DocumentResult, DocumentTranslator, InputDocument, ProgressEvent, ProgressStatus,
    SegmentTask, ServiceStats, StatsSnapshot, TranslationProgress,
};
pub use validation::{validate_language_pair, validate_text, validate_upload_size};
