//! 翻译管道模块
//!
//! 提供文档处理管道，包括片段收集、回填和序列化

pub mod collector;
pub mod reinject;

// 重新导出主要类型
pub use collector::{
    count_translatable_elements, CollectionStats, CollectorConfig, ExtractedDocument,
    ExtractionMode, Segment, SegmentCollector, TagName,
};
pub use reinject::{reinject, serialize, set_document_language, LANG_ATTRIBUTE};
