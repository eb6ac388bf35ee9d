//! XML 解析和处理模块
//!
//! - `dom`: 文档树与节点操作
//! - `parser`: 编码检测与解析
//! - `path`: 结构化定位路径
//! - `serializer`: 保持编码的序列化

pub mod dom;
pub mod parser;
pub mod path;
pub mod serializer;

pub use dom::{
    Attribute, Element, NodeId, NodeKind, QuoteStyle, XmlDeclaration, XmlDocument, XML_NAMESPACE,
};
pub use parser::{detect_declared_encoding, parse_xml};
pub use path::{PathStep, StructuralPath};
pub use serializer::{serialize_document, SerializeOptions};

/// XML 处理错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("XML serialization error: {0}")]
    Serialize(String),
}
