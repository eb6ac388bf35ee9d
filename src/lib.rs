//! # DCIA Library
//!
//! 对 SCENARI XML 文档进行片段级翻译、校对和改写的工具库，
//! 通过本地 Ollama 后端生成文本，并保持文档结构、命名空间和编码不变。
//!
//! ## 模块组织
//!
//! - `core` - 根错误类型和文件名、预览等通用函数
//! - `env` - 类型安全的环境变量
//! - `parsers` - XML 文档树、解析、定位路径和序列化
//! - `translation` - 片段管道、生成客户端、结构化输出恢复和文档处理服务
//! - `builders` - 输出文件构建（单文档或 ZIP）
//! - `web` - Web服务器功能（可选）

pub mod builders;
pub mod core;
pub mod env;
pub mod parsers;
pub mod translation;
#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used items for convenience
pub use core::*;
pub use parsers::*;
