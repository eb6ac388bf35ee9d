//! # 解析器模块
//!
//! 这个模块包含文档解析和序列化功能：
//!
//! - XML解析、命名空间解析和编码检测
//! - 元素定位路径
//! - 保持原始编码的序列化
//!
//! # 模块组织
//!
//! - `xml` - XML文档树、解析、定位路径和序列化

pub mod xml;

// Re-export commonly used items for convenience
pub use xml::{
    parse_xml, serialize_document, NodeId, SerializeOptions, StructuralPath, XmlDocument,
    XmlError,
};
