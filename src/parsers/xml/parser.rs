//! XML 解析
//!
//! 先按 BOM 或声明检测编码并解码，再用 quick-xml 逐事件构建文档树。

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::escape::{unescape, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::bytes::Regex;

use super::dom::{
    Attribute, Element, NodeId, NodeKind, QuoteStyle, XmlDeclaration, XmlDocument, XML_NAMESPACE,
};
use super::XmlError;

fn declaration_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).ok()
    })
    .as_ref()
}

fn entity_declaration_regex() -> Option<&'static regex::Regex> {
    static RE: OnceLock<Option<regex::Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(
            r#"<!ENTITY\s+([A-Za-z_:][-A-Za-z0-9._:]*)\s+(?:"([^"]*)"|'([^']*)'|((?:SYSTEM|PUBLIC)\b[^>]*))\s*>"#,
        )
        .ok()
    })
    .as_ref()
}

/// 从文档类型声明的内部子集中收集一般实体
///
/// 替换文本中的字符引用和预定义实体会先被还原。外部实体不加载，
/// 替换为空文本；参数实体（`%name`）被忽略。
pub fn parse_entity_declarations(doctype: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let Some(regex) = entity_declaration_regex() else {
        return entities;
    };

    for captures in regex.captures_iter(doctype) {
        let Some(name) = captures.get(1) else {
            continue;
        };
        let value = match captures.get(2).or_else(|| captures.get(3)) {
            Some(value) => unescape_value(value.as_str()),
            None => {
                tracing::debug!("外部实体 {} 不加载", name.as_str());
                String::new()
            }
        };
        // 重复声明以第一个为准
        entities.entry(name.as_str().to_string()).or_insert(value);
    }

    entities
}

/// 读取 XML 声明中的编码标记（保持原始大小写）
pub fn detect_declared_encoding(data: &[u8]) -> Option<String> {
    let head = &data[..data.len().min(512)];
    declaration_regex()?
        .captures(head)
        .and_then(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// 解析 XML 字节为文档树
pub fn parse_xml(data: &[u8]) -> Result<XmlDocument, XmlError> {
    let (encoding, bom_len) = match Encoding::for_bom(data) {
        Some((encoding, len)) => (encoding, len),
        None => match detect_declared_encoding(data) {
            Some(label) => (
                Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| XmlError::Parse(format!("unsupported encoding '{}'", label)))?,
                0,
            ),
            None => (UTF_8, 0),
        },
    };

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(&data[bom_len..])
        .ok_or_else(|| {
            XmlError::Parse(format!("input is not valid {} text", encoding.name()))
        })?;

    let mut document = XmlDocument::new(encoding, bom_len > 0);
    build_tree(&text, &mut document)?;

    tracing::debug!(
        "XML 解析完成: 根元素 {:?}, 编码 {}",
        document.element(document.root()).map(|e| e.name.as_str()),
        document.declared_encoding()
    );

    Ok(document)
}

struct TreeBuilder {
    open: Vec<NodeId>,
    scopes: Vec<HashMap<String, String>>,
    root: Option<NodeId>,
    entities: HashMap<String, String>,
}

impl TreeBuilder {
    fn current_parent(&self, document: &XmlDocument) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| document.document_node())
    }

    fn resolve(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix))
            .filter(|uri| !uri.is_empty())
            .cloned()
    }
}

fn build_tree(text: &str, document: &mut XmlDocument) -> Result<(), XmlError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(false);

    let mut builder = TreeBuilder {
        open: Vec::new(),
        scopes: Vec::new(),
        root: None,
        entities: HashMap::new(),
    };

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| XmlError::Parse(format!("{} at position {}", e, position)))?;

        match event {
            Event::Decl(decl) => {
                let version = decl
                    .version()
                    .map(|v| String::from_utf8_lossy(&v).into_owned())
                    .map_err(|e| XmlError::Parse(e.to_string()))?;
                let encoding = decl
                    .encoding()
                    .transpose()
                    .map_err(|e| XmlError::Parse(e.to_string()))?
                    .map(|v| String::from_utf8_lossy(&v).into_owned());
                let standalone = decl
                    .standalone()
                    .transpose()
                    .map_err(|e| XmlError::Parse(e.to_string()))?
                    .map(|v| String::from_utf8_lossy(&v).into_owned());
                document.set_declaration(XmlDeclaration {
                    version,
                    encoding,
                    standalone,
                    raw: utf8(&decl)?.into_owned(),
                });
            }
            Event::Start(start) => {
                let id = open_element(document, &mut builder, &start, false)?;
                builder.open.push(id);
            }
            Event::Empty(start) => {
                open_element(document, &mut builder, &start, true)?;
                builder.scopes.pop();
            }
            Event::End(_) => {
                builder.open.pop();
                builder.scopes.pop();
            }
            Event::Text(content) => {
                let raw = utf8(&content)?;
                if builder.open.is_empty() && !raw.trim().is_empty() {
                    return Err(XmlError::Parse(format!(
                        "text outside of the root element at position {}",
                        position
                    )));
                }
                unescape_with(&raw, |name| builder.entities.get(name).map(String::as_str))
                    .map_err(|e| XmlError::Parse(format!("{} at position {}", e, position)))?;
                let parent = builder.current_parent(document);
                document.append(parent, NodeKind::Text(raw.into_owned()));
            }
            Event::CData(data) => {
                let parent = builder.current_parent(document);
                let content = utf8(&data.into_inner())?.into_owned();
                document.append(parent, NodeKind::CData(content));
            }
            Event::Comment(comment) => {
                let parent = builder.current_parent(document);
                document.append(parent, NodeKind::Comment(utf8(&comment)?.into_owned()));
            }
            Event::PI(pi) => {
                let parent = builder.current_parent(document);
                document.append(
                    parent,
                    NodeKind::ProcessingInstruction(utf8(&pi)?.into_owned()),
                );
            }
            Event::DocType(doctype) => {
                let raw = utf8(&doctype)?.into_owned();
                builder.entities = parse_entity_declarations(&raw);
                if !builder.entities.is_empty() {
                    tracing::debug!("文档类型声明定义了 {} 个实体", builder.entities.len());
                    document.set_entities(builder.entities.clone());
                }
                let parent = builder.current_parent(document);
                document.append(parent, NodeKind::DocType(raw));
            }
            Event::Eof => break,
        }
    }

    if let Some(unclosed) = builder.open.last() {
        let name = document
            .element(*unclosed)
            .map(|e| e.name.clone())
            .unwrap_or_default();
        return Err(XmlError::Parse(format!(
            "premature end of data: element <{}> is not closed",
            name
        )));
    }

    match builder.root {
        Some(root) => {
            document.set_root(root);
            Ok(())
        }
        None => Err(XmlError::Parse("document is empty".to_string())),
    }
}

fn open_element(
    document: &mut XmlDocument,
    builder: &mut TreeBuilder,
    start: &BytesStart<'_>,
    self_closing: bool,
) -> Result<NodeId, XmlError> {
    if builder.open.is_empty() && builder.root.is_some() {
        return Err(XmlError::Parse(
            "extra content at the end of the document".to_string(),
        ));
    }

    let name = utf8(start.name().as_ref())?.into_owned();

    let mut attributes = Vec::new();
    let mut scope = HashMap::new();
    let raw_attributes = start.attributes_raw();
    let mut cursor = 0;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = utf8(attr.key.as_ref())?.into_owned();
        let value = utf8(&attr.value)?.into_owned();
        let quote = next_quote(raw_attributes, &mut cursor, attr.value.len());

        if key == "xmlns" {
            scope.insert(String::new(), unescape_value(&value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), unescape_value(&value));
        }

        attributes.push(Attribute {
            name: key,
            value,
            quote,
        });
    }
    builder.scopes.push(scope);

    let prefix = name.split_once(':').map(|(p, _)| p).unwrap_or("");
    let namespace = builder.resolve(prefix);
    if namespace.is_none() && !prefix.is_empty() {
        return Err(XmlError::Parse(format!(
            "namespace prefix '{}' on <{}> is not defined",
            prefix, name
        )));
    }

    let parent = builder.current_parent(document);
    let id = document.append(
        parent,
        NodeKind::Element(Element {
            name,
            namespace,
            attributes,
            self_closing,
        }),
    );

    if builder.open.is_empty() {
        builder.root = Some(id);
    }

    Ok(id)
}

/// 读取下一个属性值的引号，并把游标移到该值之后
fn next_quote(raw: &[u8], cursor: &mut usize, value_len: usize) -> QuoteStyle {
    let rest = raw.get(*cursor..).unwrap_or_default();
    match rest.iter().position(|b| *b == b'"' || *b == b'\'') {
        Some(offset) => {
            *cursor += offset + value_len + 2;
            if rest[offset] == b'\'' {
                QuoteStyle::Single
            } else {
                QuoteStyle::Double
            }
        }
        None => QuoteStyle::Double,
    }
}

fn utf8(bytes: &[u8]) -> Result<Cow<'_, str>, XmlError> {
    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(|e| XmlError::Parse(e.to_string()))
}

fn unescape_value(value: &str) -> String {
    unescape(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
