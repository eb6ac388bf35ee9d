//! 翻译运行报告

use serde::{Deserialize, Serialize};

use crate::core::{text_preview, timestamp_now, PREVIEW_MAX_CHARS};

/// 单个片段的处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub locator: String,
    pub original_preview: String,
    pub translated_preview: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SegmentReport {
    pub fn succeeded(locator: String, original: &str, translated: &str) -> Self {
        Self {
            locator,
            original_preview: text_preview(original, PREVIEW_MAX_CHARS),
            translated_preview: text_preview(translated, PREVIEW_MAX_CHARS),
            success: true,
            error: None,
        }
    }

    pub fn failed(locator: String, original: &str, error: String) -> Self {
        Self {
            locator,
            original_preview: text_preview(original, PREVIEW_MAX_CHARS),
            translated_preview: String::new(),
            success: false,
            error: Some(error),
        }
    }
}

/// 一次翻译运行的报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationReport {
    pub total_segments: usize,
    pub translated: usize,
    pub failed: usize,
    /// 匹配了标签但被忽略规则或空文本规则跳过的元素
    pub ignored: usize,
    pub duration_seconds: f64,
    /// RFC 3339 时间戳
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub segments: Vec<SegmentReport>,
}

impl TranslationReport {
    pub fn new(total_segments: usize, ignored: usize) -> Self {
        Self {
            total_segments,
            ignored,
            generated_at: timestamp_now(),
            ..Self::default()
        }
    }

    /// 追加片段结果并更新计数
    pub fn record(&mut self, segment: SegmentReport) {
        if segment.success {
            self.translated += 1;
        } else {
            self.failed += 1;
        }
        self.segments.push(segment);
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_segments == 0 {
            1.0
        } else {
            self.translated as f64 / self.total_segments as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.translated == self.total_segments
    }
}
