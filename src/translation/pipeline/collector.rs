//! 片段收集器模块
//!
//! 按标签允许列表定位承载文本的元素，应用忽略规则和空文本规则，
//! 并为每个元素计算结构化定位路径

use std::collections::HashSet;

use crate::core::word_count;
use crate::parsers::{parse_xml, NodeId, StructuralPath, XmlDocument};
use crate::translation::config::{constants, SegmentOrder};
use crate::translation::error::TranslationResult;

/// 提取模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// 通用模式：匹配允许列表中的全部标签，只取元素自身的直接文本
    #[default]
    DirectText,
    /// 整段模式：只匹配规范段落标签，取子树的全部文本
    WholeUnit,
}

/// 带命名空间的标签名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagName {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl TagName {
    pub fn new(namespace: Option<&str>, local_name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
        }
    }

    pub fn qualified(namespace: &str, local_name: &str) -> Self {
        Self::new(Some(namespace), local_name)
    }

    fn matches(&self, document: &XmlDocument, id: NodeId) -> bool {
        document
            .element(id)
            .map(|e| e.matches(self.namespace.as_deref(), &self.local_name))
            .unwrap_or(false)
    }
}

/// 收集器配置
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 提取模式
    pub mode: ExtractionMode,
    /// 承载文本的标签，顺序即分组顺序
    pub text_elements: Vec<TagName>,
    /// 整段模式下匹配的段落标签
    pub canonical_paragraph: TagName,
    /// 忽略的元素本地名（作用于元素本身和其直接父元素）
    pub ignore_elements: Vec<String>,
    /// 输出顺序
    pub order: SegmentOrder,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let (ns, local) = constants::CANONICAL_PARAGRAPH;
        Self {
            mode: ExtractionMode::DirectText,
            text_elements: constants::TEXT_ELEMENTS
                .iter()
                .map(|(ns, local)| TagName::qualified(ns, local))
                .collect(),
            canonical_paragraph: TagName::qualified(ns, local),
            ignore_elements: constants::IGNORE_ELEMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            order: SegmentOrder::default(),
        }
    }
}

impl CollectorConfig {
    /// 整段模式配置
    pub fn whole_unit() -> Self {
        Self {
            mode: ExtractionMode::WholeUnit,
            ..Self::default()
        }
    }

    pub fn with_order(mut self, order: SegmentOrder) -> Self {
        self.order = order;
        self
    }

    fn matched_tags(&self) -> Vec<&TagName> {
        match self.mode {
            ExtractionMode::DirectText => self.text_elements.iter().collect(),
            ExtractionMode::WholeUnit => vec![&self.canonical_paragraph],
        }
    }
}

/// 一个待处理的文本片段
#[derive(Debug, Clone)]
pub struct Segment {
    /// 元素在文档中的结构化地址
    pub locator: StructuralPath,
    /// 去除首尾空白后的原文
    pub original_text: String,
    /// 指向文档树中元素的句柄
    pub node: NodeId,
}

impl Segment {
    pub fn word_count(&self) -> usize {
        word_count(&self.original_text)
    }
}

/// 收集统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// 标签匹配的元素数
    pub elements_matched: usize,
    /// 输出的片段数
    pub segments_collected: usize,
    /// 因忽略规则跳过
    pub ignored_elements: usize,
    /// 因文本为空跳过
    pub empty_elements: usize,
}

impl CollectionStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 匹配但未输出的元素总数
    pub fn skipped(&self) -> usize {
        self.ignored_elements + self.empty_elements
    }
}

/// 解析并提取后的文档
#[derive(Debug)]
pub struct ExtractedDocument {
    pub document: XmlDocument,
    pub segments: Vec<Segment>,
}

/// XML 片段收集器
pub struct SegmentCollector {
    config: CollectorConfig,
    stats: CollectionStats,
}

impl Default for SegmentCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

impl SegmentCollector {
    /// 创建新的片段收集器
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            stats: CollectionStats::default(),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// 最近一次收集的统计
    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// 解析字节并提取片段
    ///
    /// 解析失败时返回错误，不会产生部分结果。
    pub fn extract(&mut self, data: &[u8]) -> TranslationResult<ExtractedDocument> {
        self.stats.reset();

        let document = parse_xml(data).map_err(|e| {
            tracing::error!("XML 解析失败: {}", e);
            e
        })?;
        let segments = self.collect(&document);

        Ok(ExtractedDocument { document, segments })
    }

    /// 从已解析的文档中收集片段，不修改文档
    pub fn collect(&mut self, document: &XmlDocument) -> Vec<Segment> {
        self.stats.reset();

        let root = document.root();
        let descendants = document.descendant_elements(root);
        let tags = self.config.matched_tags();

        let candidates: Vec<NodeId> = match self.config.order {
            SegmentOrder::TagThenDocument => tags
                .iter()
                .flat_map(|tag| {
                    descendants
                        .iter()
                        .copied()
                        .filter(move |id| tag.matches(document, *id))
                })
                .collect(),
            SegmentOrder::Document => descendants
                .iter()
                .copied()
                .filter(|id| tags.iter().any(|tag| tag.matches(document, *id)))
                .collect(),
        };

        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        for id in candidates {
            if !seen.insert(id) {
                continue;
            }
            self.stats.elements_matched += 1;

            if self.is_ignored(document, id) {
                self.stats.ignored_elements += 1;
                continue;
            }

            let text = self.segment_text(document, id);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                self.stats.empty_elements += 1;
                continue;
            }

            segments.push(Segment {
                locator: StructuralPath::of(document, id),
                original_text: trimmed.to_string(),
                node: id,
            });
        }

        self.stats.segments_collected = segments.len();
        tracing::info!(
            "提取到 {} 个可翻译片段 (忽略 {}, 空文本 {})",
            segments.len(),
            self.stats.ignored_elements,
            self.stats.empty_elements
        );

        segments
    }

    /// 元素本身或其直接父元素在忽略列表中
    fn is_ignored(&self, document: &XmlDocument, id: NodeId) -> bool {
        let ignored = |node: NodeId| {
            document
                .element(node)
                .map(|e| self.config.ignore_elements.iter().any(|i| i == e.local_name()))
                .unwrap_or(false)
        };

        ignored(id) || document.parent_element(id).map(ignored).unwrap_or(false)
    }

    fn segment_text(&self, document: &XmlDocument, id: NodeId) -> String {
        match self.config.mode {
            ExtractionMode::DirectText => document.direct_text(id),
            ExtractionMode::WholeUnit => document.text_content(id),
        }
    }
}

/// 统计整段模式下可翻译的段落数，解析失败时返回 0
pub fn count_translatable_elements(data: &[u8]) -> usize {
    let mut collector = SegmentCollector::new(CollectorConfig::whole_unit());
    match collector.extract(data) {
        Ok(extracted) => extracted.segments.len(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sc:item xmlns:sc="http://www.utc.fr/ics/scenari/v3/core">
  <sc:content>
    <sc:para>Premier paragraphe</sc:para>
    <sc:title>Un titre</sc:title>
    <sc:para>   </sc:para>
    <sc:para>Second paragraphe</sc:para>
    <sc:code><sc:para>ignored</sc:para></sc:code>
  </sc:content>
</sc:item>"#;

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.original_text.as_str()).collect()
    }

    #[test]
    fn test_tag_then_document_order() {
        let mut collector = SegmentCollector::default();
        let extracted = collector.extract(DOC.as_bytes()).unwrap();

        assert_eq!(
            texts(&extracted.segments),
            vec!["Premier paragraphe", "Second paragraphe", "Un titre"]
        );
        assert_eq!(collector.stats().ignored_elements, 1);
        assert_eq!(collector.stats().empty_elements, 1);
    }

    #[test]
    fn test_document_order() {
        let config = CollectorConfig::default().with_order(SegmentOrder::Document);
        let mut collector = SegmentCollector::new(config);
        let extracted = collector.extract(DOC.as_bytes()).unwrap();

        assert_eq!(
            texts(&extracted.segments),
            vec!["Premier paragraphe", "Un titre", "Second paragraphe"]
        );
    }

    #[test]
    fn test_locators_are_unique_and_resolve() {
        let mut collector = SegmentCollector::default();
        let extracted = collector.extract(DOC.as_bytes()).unwrap();

        let locators: HashSet<String> = extracted
            .segments
            .iter()
            .map(|s| s.locator.to_string())
            .collect();
        assert_eq!(locators.len(), extracted.segments.len());

        for segment in &extracted.segments {
            assert_eq!(segment.locator.resolve(&extracted.document), Some(segment.node));
        }
    }

    #[test]
    fn test_direct_text_ignores_child_text() {
        let xml = r#"<sc:item xmlns:sc="http://www.utc.fr/ics/scenari/v3/core"><sc:para><sc:inlineStyle>gras</sc:inlineStyle> suite</sc:para></sc:item>"#;

        let mut direct = SegmentCollector::default();
        assert!(direct.extract(xml.as_bytes()).unwrap().segments.is_empty());

        let mut whole = SegmentCollector::new(CollectorConfig::whole_unit());
        let extracted = whole.extract(xml.as_bytes()).unwrap();
        assert_eq!(texts(&extracted.segments), vec!["gras suite"]);
    }

    #[test]
    fn test_parse_failure_yields_error() {
        let mut collector = SegmentCollector::default();
        let result = collector.extract(b"<invalid>");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("XML"));
        assert_eq!(count_translatable_elements(b"<invalid>"), 0);
    }

    #[test]
    fn test_count_translatable_elements() {
        assert_eq!(count_translatable_elements(DOC.as_bytes()), 2);
    }
}
