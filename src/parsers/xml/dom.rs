//! XML 文档树
//!
//! 节点保存在 arena 中，`NodeId` 是提取与回填之间传递的不透明句柄。
//! 文本、属性值保持源文档中的转义形式，序列化时原样写回。

use std::collections::HashMap;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::escape::{escape, partial_escape, unescape, unescape_with};

/// `xml:` 前缀固定绑定的命名空间
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// 节点句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// 属性值使用的引号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    #[default]
    Double,
    Single,
}

impl QuoteStyle {
    pub fn as_char(self) -> char {
        match self {
            QuoteStyle::Double => '"',
            QuoteStyle::Single => '\'',
        }
    }
}

/// 元素属性，`value` 为转义后的原始文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub quote: QuoteStyle,
}

impl Attribute {
    /// 反转义后的属性值
    pub fn unescaped_value(&self) -> String {
        unescape(&self.value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| self.value.clone())
    }
}

/// 元素节点数据
#[derive(Debug, Clone)]
pub struct Element {
    /// 源文档中书写的限定名，如 `sc:para`
    pub name: String,
    /// 解析得到的命名空间 URI
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    /// 源文档中是否写作 `<x/>`
    pub self_closing: bool,
}

impl Element {
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Clark 记法的展开名：`{uri}local`，无命名空间时为本地名
    pub fn expanded_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{}}}{}", ns, self.local_name()),
            None => self.local_name().to_string(),
        }
    }

    /// 是否与给定的 (命名空间, 本地名) 匹配
    pub fn matches(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local_name() == local_name
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(Element),
    /// 转义后的文本
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// XML 声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
    /// `<?` 与 `?>` 之间的原始文本
    pub raw: String,
}

/// 解析后的 XML 文档
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    declaration: Option<XmlDeclaration>,
    encoding: &'static Encoding,
    had_bom: bool,
    /// 内部 DTD 子集声明的一般实体
    entities: HashMap<String, String>,
}

impl XmlDocument {
    pub(crate) fn new(encoding: &'static Encoding, had_bom: bool) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: None,
            declaration: None,
            encoding,
            had_bom,
            entities: HashMap::new(),
        }
    }

    /// 追加子节点并返回其句柄
    pub(crate) fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub(crate) fn set_declaration(&mut self, declaration: XmlDeclaration) {
        self.declaration = Some(declaration);
    }

    pub(crate) fn set_entities(&mut self, entities: HashMap<String, String>) {
        self.entities = entities;
    }

    /// 文档类型声明中定义的实体（名称到替换文本）
    pub fn entities(&self) -> &HashMap<String, String> {
        &self.entities
    }

    /// 还原文本节点中的实体引用，未知实体保持原样
    fn unescape_lossy(&self, raw: &str) -> String {
        unescape_with(raw, |name| self.entities.get(name).map(String::as_str))
            .map(|t| t.into_owned())
            .unwrap_or_else(|_| raw.to_string())
    }

    pub fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    /// 根元素。解析成功的文档总有根元素
    pub fn root(&self) -> NodeId {
        self.root.unwrap_or(NodeId(0))
    }

    pub fn declaration(&self) -> Option<&XmlDeclaration> {
        self.declaration.as_ref()
    }

    /// 输入文档使用的字符编码
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn had_bom(&self) -> bool {
        self.had_bom
    }

    /// 声明中书写的编码标记，缺省时为 `UTF-8`
    pub fn declared_encoding(&self) -> &str {
        self.declaration
            .as_ref()
            .and_then(|d| d.encoding.as_deref())
            .unwrap_or_else(|| {
                if self.encoding == UTF_8 {
                    "UTF-8"
                } else {
                    self.encoding.name()
                }
            })
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// 父元素（文档节点不算元素）
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.element(*p).is_some())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.element(*c).is_some())
    }

    /// 先序遍历 `id` 之下的全部元素（不含自身）
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();

        while let Some(current) = stack.pop() {
            if self.element(current).is_some() {
                found.push(current);
                stack.extend(self.children(current).iter().rev().copied());
            }
        }

        found
    }

    /// 元素的直接文本：第一个非文本子节点之前的文本（反转义后）
    pub fn direct_text(&self, id: NodeId) -> String {
        let mut text = String::new();
        for child in self.children(id) {
            match &self.nodes[child.0].kind {
                NodeKind::Text(raw) => text.push_str(&self.unescape_lossy(raw)),
                NodeKind::CData(data) => text.push_str(data),
                _ => break,
            }
        }
        text
    }

    /// 子树中全部文本的拼接（不含注释与处理指令）
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for child in self.children(id) {
            match &self.nodes[child.0].kind {
                NodeKind::Text(raw) => out.push_str(&self.unescape_lossy(raw)),
                NodeKind::CData(data) => out.push_str(data),
                NodeKind::Element(_) => self.collect_text(*child, out),
                _ => {}
            }
        }
    }

    /// 替换元素的直接文本，保留其后的子节点
    pub fn set_direct_text(&mut self, id: NodeId, text: &str) {
        let children = &self.nodes[id.0].children;
        let leading = children
            .iter()
            .take_while(|c| {
                matches!(
                    self.nodes[c.0].kind,
                    NodeKind::Text(_) | NodeKind::CData(_)
                )
            })
            .count();

        let detached: Vec<NodeId> = self.nodes[id.0].children.drain(..leading).collect();
        for node in detached {
            self.nodes[node.0].parent = None;
        }

        if !text.is_empty() {
            let node = self.new_detached(NodeKind::Text(partial_escape(text).into_owned()));
            self.nodes[node.0].parent = Some(id);
            self.nodes[id.0].children.insert(0, node);
        }
        self.mark_open(id);
    }

    /// 移除全部子节点后写入纯文本
    pub fn replace_children_with_text(&mut self, id: NodeId, text: &str) {
        let detached = std::mem::take(&mut self.nodes[id.0].children);
        for node in detached {
            self.nodes[node.0].parent = None;
        }
        if !text.is_empty() {
            self.append(id, NodeKind::Text(partial_escape(text).into_owned()));
        }
        self.mark_open(id);
    }

    /// 反转义后的属性值
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)
            .and_then(|e| e.attribute(name))
            .map(Attribute::unescaped_value)
    }

    /// 设置属性（已存在时原位替换）
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let escaped = escape(value).into_owned();
        match self.element_mut(id) {
            Some(element) => {
                match element.attributes.iter_mut().find(|a| a.name == name) {
                    Some(attr) => attr.value = escaped,
                    None => element.attributes.push(Attribute {
                        name: name.to_string(),
                        value: escaped,
                        quote: QuoteStyle::Double,
                    }),
                }
                true
            }
            None => false,
        }
    }

    /// 元素上声明的命名空间，`(前缀, URI)`，默认命名空间前缀为空串
    pub fn namespace_declarations(&self, id: NodeId) -> Vec<(String, String)> {
        self.element(id)
            .map(|e| {
                e.attributes
                    .iter()
                    .filter_map(|a| {
                        if a.name == "xmlns" {
                            Some((String::new(), a.unescaped_value()))
                        } else {
                            a.name
                                .strip_prefix("xmlns:")
                                .map(|p| (p.to_string(), a.unescaped_value()))
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn new_detached(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn mark_open(&mut self, id: NodeId) {
        let has_children = !self.nodes[id.0].children.is_empty();
        if let Some(element) = self.element_mut(id) {
            if has_children {
                element.self_closing = false;
            }
        }
    }
}
