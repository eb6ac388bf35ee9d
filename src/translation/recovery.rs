//! 结构化输出恢复
//!
//! 模型返回的 JSON 常被 markdown 代码块包裹、夹杂说明文字，或在字符串中
//! 含有未转义的换行。按以下顺序尝试，第一个成功的结果胜出：
//!
//! 1. 所有标注为 json 的代码块，从最后一个往前
//! 2. 去掉首尾围栏后直接解析
//! 3. 一次引号感知的扫描找出平衡的 `{...}` 子串，按起点顺序解析
//! 4. 清理控制字符后整体解析

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::translation::error::{helpers, TranslationResult};

/// 括号匹配阶段最多尝试的候选数
const MAX_BRACE_CANDIDATES: usize = 64;

fn fenced_json_regex() -> Option<&'static Regex> {
    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    FENCED
        .get_or_init(|| Regex::new(r"```(?:json|JSON)[ \t]*\r?\n?((?s:.*?))```").ok())
        .as_ref()
}

/// 从模型输出中恢复一个 JSON 对象
pub fn recover(raw: &str) -> TranslationResult<Value> {
    // 1. json 代码块，最新的优先
    if let Some(regex) = fenced_json_regex() {
        let blocks: Vec<&str> = regex
            .captures_iter(raw)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        for block in blocks.iter().rev() {
            if let Some(value) = parse_object(&sanitize_control_chars(block.trim())) {
                tracing::debug!("从代码块恢复 JSON ({} 个候选)", blocks.len());
                return Ok(value);
            }
        }
    }

    // 2. 去掉首尾围栏
    let cleaned = strip_fence(raw.trim());
    if let Some(value) = parse_object(cleaned) {
        return Ok(value);
    }

    // 3. 括号匹配
    for (start, end) in balanced_spans(cleaned)
        .into_iter()
        .take(MAX_BRACE_CANDIDATES)
    {
        let candidate = &cleaned[start..=end];
        if let Some(value) = parse_object(&sanitize_control_chars(candidate)) {
            tracing::debug!("通过括号匹配恢复 JSON (偏移 {})", start);
            return Ok(value);
        }
    }

    // 4. 整体清理后解析
    if let Some(value) = parse_object(&sanitize_control_chars(cleaned)) {
        return Ok(value);
    }

    tracing::warn!("无法从模型输出中恢复 JSON ({} 字符)", raw.chars().count());
    Err(helpers::malformed_output(
        "no JSON object could be recovered from model output",
        raw,
    ))
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// 去掉一个开头围栏行（含语言标注）和一个结尾围栏
fn strip_fence(text: &str) -> &str {
    let mut text = text;
    if text.starts_with("```") {
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            None => text.trim_start_matches('`'),
        };
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped;
    }
    text.trim()
}

/// 转义字符串字面量内部的控制字符
pub fn sanitize_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    push_escaped(&mut out, next);
                }
            }
            _ => push_escaped(&mut out, c),
        }
    }

    out
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}

/// 找出所有平衡的 `{...}` 区间（闭区间字节偏移），按起点排序。
/// 字符串中的括号被忽略；不在任何括号内的引号不改变状态。
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(offset),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, offset));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|(start, _)| *start);
    spans
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// 列表字段：非列表的值包装为单元素列表，空值（null、false、0、空串、空对象）为空列表
fn list_field(object: &Map<String, Value>, key: &str) -> Vec<String> {
    let item = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match object.get(key) {
        Some(Value::Array(items)) => items.iter().map(item).collect(),
        Some(Value::Null) | Some(Value::Bool(false)) | None => Vec::new(),
        Some(Value::String(s)) if s.is_empty() => Vec::new(),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Vec::new(),
        Some(Value::Object(o)) if o.is_empty() => Vec::new(),
        Some(other) => vec![item(other)],
    }
}

/// 可由恢复结果构造的结构化输出
pub trait StructuredOutput: Sized {
    fn from_object(object: &Map<String, Value>) -> Self;

    /// 回填到文档中的主文本
    fn primary_text(&self) -> &str;

    fn from_raw(raw: &str) -> TranslationResult<Self> {
        let value = recover(raw)?;
        match value.as_object() {
            Some(object) => Ok(Self::from_object(object)),
            None => Err(helpers::malformed_output("recovered value is not an object", raw)),
        }
    }
}

/// 校对结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub corrected_text: String,
    pub explanations: Vec<String>,
}

impl StructuredOutput for Correction {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            corrected_text: string_field(object, "corrected_text"),
            explanations: list_field(object, "explanations"),
        }
    }

    fn primary_text(&self) -> &str {
        &self.corrected_text
    }
}

/// 改写结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reformulation {
    pub reformulated_text: String,
    pub highlights: Vec<String>,
}

impl StructuredOutput for Reformulation {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            reformulated_text: string_field(object, "reformulated_text"),
            highlights: list_field(object, "highlights"),
        }
    }

    fn primary_text(&self) -> &str {
        &self.reformulated_text
    }
}

/// 会议纪要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub summary: String,
    pub decisions: Vec<String>,
    pub action_items: Vec<String>,
}

impl StructuredOutput for MeetingSummary {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            summary: string_field(object, "summary"),
            decisions: list_field(object, "decisions"),
            action_items: list_field(object, "action_items"),
        }
    }

    fn primary_text(&self) -> &str {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::TranslationError;
    use serde_json::json;

    #[test]
    fn test_valid_json_is_unchanged() {
        let original = json!({"a": 1, "b": ["x", {"c": null}], "d": "texte \"cité\""});
        let recovered = recover(&original.to_string()).unwrap();
        assert_eq!(recovered, original);
    }

    #[test]
    fn test_three_shapes_recover_same_object() {
        let expected = json!({"corrected_text": "Bonjour\nmonde", "explanations": ["e1"]});

        let raw = r#"{"corrected_text": "Bonjour\nmonde", "explanations": ["e1"]}"#;
        let fenced = format!("Voici le résultat :\n```json\n{}\n```\nBonne journée", raw);
        let literal_newline = "{\"corrected_text\": \"Bonjour\nmonde\", \"explanations\": [\"e1\"]}";

        assert_eq!(recover(raw).unwrap(), expected);
        assert_eq!(recover(&fenced).unwrap(), expected);
        assert_eq!(recover(literal_newline).unwrap(), expected);
    }

    #[test]
    fn test_latest_fenced_block_wins() {
        let raw = "```json\n{\"v\": 1}\n```\nCorrection :\n```json\n{\"v\": 2}\n```";
        assert_eq!(recover(raw).unwrap(), json!({"v": 2}));
    }

    #[test]
    fn test_invalid_latest_block_falls_back_to_earlier() {
        let raw = "```json\n{\"v\": 1}\n```\n```json\n{\"v\": \n```";
        assert_eq!(recover(raw).unwrap(), json!({"v": 1}));
    }

    #[test]
    fn test_brace_scan_ignores_braces_in_strings() {
        let raw = r#"Réponse: {"text": "a } b { c", "n": 2} fin"#;
        assert_eq!(recover(raw).unwrap(), json!({"text": "a } b { c", "n": 2}));
    }

    #[test]
    fn test_nested_candidates_tried_outermost_first() {
        let raw = r#"Note {pas json} puis {"outer": {"inner": 1}} fin"#;
        assert_eq!(recover(raw).unwrap(), json!({"outer": {"inner": 1}}));
    }

    #[test]
    fn test_stray_quote_in_prose_does_not_hide_object() {
        let raw = r#"Écran 5" : {"summary": "ok"}"#;
        assert_eq!(recover(raw).unwrap(), json!({"summary": "ok"}));
    }

    #[test]
    fn test_many_open_braces_fail_fast() {
        let started = std::time::Instant::now();
        assert!(recover(&"{".repeat(20_000)).is_err());

        let nested = format!("{}{}", "{".repeat(20_000), "}".repeat(20_000));
        assert!(recover(&nested).is_err());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_balanced_spans_single_pass() {
        let spans = balanced_spans(r#"a {"k": "}"} b {x {y}} }"#);
        assert_eq!(spans, vec![(2, 11), (15, 21), (18, 20)]);
    }

    #[test]
    fn test_untagged_fence_is_stripped() {
        let raw = "```\n{\"summary\": \"ok\"}\n```";
        assert_eq!(recover(raw).unwrap(), json!({"summary": "ok"}));
    }

    #[test]
    fn test_failure_carries_truncated_snippet() {
        let raw = "pas de JSON ici ".repeat(100);
        match recover(&raw) {
            Err(TranslationError::MalformedStructuredOutput { snippet, .. }) => {
                assert_eq!(snippet.chars().count(), 500);
                assert!(raw.starts_with(&snippet));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_sanitize_only_touches_strings() {
        let sanitized = sanitize_control_chars("{\n\"a\": \"x\ty\"\n}");
        assert_eq!(sanitized, "{\n\"a\": \"x\\ty\"\n}");
    }

    #[test]
    fn test_correction_from_fenced_output() {
        let raw = "```json\n{\"corrected_text\":\"X\",\"explanations\":[\"e1\"]}\n```";
        let correction = Correction::from_raw(raw).unwrap();
        assert_eq!(
            correction,
            Correction {
                corrected_text: "X".to_string(),
                explanations: vec!["e1".to_string()],
            }
        );
    }

    #[test]
    fn test_list_fields_are_coerced() {
        let reformulation =
            Reformulation::from_raw(r#"{"reformulated_text": " Texte ", "highlights": "un seul"}"#)
                .unwrap();
        assert_eq!(reformulation.reformulated_text, "Texte");
        assert_eq!(reformulation.highlights, vec!["un seul"]);

        let summary =
            MeetingSummary::from_raw(r#"{"summary": "S", "decisions": "", "action_items": null}"#)
                .unwrap();
        assert!(summary.decisions.is_empty());
        assert!(summary.action_items.is_empty());
    }

    #[test]
    fn test_falsy_list_values_are_empty() {
        let summary = MeetingSummary::from_raw(
            r#"{"summary": "S", "decisions": 0, "action_items": {}}"#,
        )
        .unwrap();
        assert!(summary.decisions.is_empty());
        assert!(summary.action_items.is_empty());

        let correction =
            Correction::from_raw(r#"{"corrected_text": "X", "explanations": 2}"#).unwrap();
        assert_eq!(correction.explanations, vec!["2"]);
    }
}
