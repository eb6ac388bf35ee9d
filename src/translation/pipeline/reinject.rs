//! 片段回填与序列化
//!
//! 整段模式会先删除段落的全部子节点再写入纯文本。后端只返回纯文本，
//! 混合内容（行内样式、链接等）在这一步会丢失。

use crate::parsers::{serialize_document, SerializeOptions, XmlDocument};
use crate::translation::error::{helpers, TranslationResult};

use super::collector::{ExtractionMode, Segment};

/// 文档语言属性
pub const LANG_ATTRIBUTE: &str = "xml:lang";

/// 将新文本写回片段所在的元素
pub fn reinject(
    document: &mut XmlDocument,
    segment: &Segment,
    text: &str,
    mode: ExtractionMode,
) -> TranslationResult<()> {
    if segment.locator.resolve(document) != Some(segment.node) {
        return Err(helpers::internal_error(format!(
            "segment {} no longer addresses a live element",
            segment.locator
        )));
    }

    match mode {
        ExtractionMode::DirectText => document.set_direct_text(segment.node, text),
        ExtractionMode::WholeUnit => document.replace_children_with_text(segment.node, text),
    }

    tracing::trace!("已回填片段 {}", segment.locator);
    Ok(())
}

/// 在根元素上设置 `xml:lang`
pub fn set_document_language(document: &mut XmlDocument, lang_code: &str) -> bool {
    let root = document.root();
    let updated = document.set_attribute(root, LANG_ATTRIBUTE, lang_code);
    if updated {
        tracing::info!("已更新 xml:lang 为 {}", lang_code);
    }
    updated
}

/// 序列化文档，保持原始编码
pub fn serialize(document: &XmlDocument, pretty_print: bool) -> TranslationResult<Vec<u8>> {
    let options = SerializeOptions {
        pretty_print,
        ..SerializeOptions::default()
    };
    Ok(serialize_document(document, &options)?)
}
