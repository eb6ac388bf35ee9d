//! # 构建器模块
//!
//! 这个模块包含用于构建输出文件的构建器：
//!
//! - 单文档 XML 输出
//! - 多文档 ZIP 归档
//!
//! # 模块组织
//!
//! - `archive` - 输出文件选择与 ZIP 打包

pub mod archive;

// Re-export commonly used items for convenience
pub use archive::{create_zip, package_results, OutputArtifact, XML_CONTENT_TYPE, ZIP_CONTENT_TYPE};
