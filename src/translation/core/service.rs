//! 文档处理服务
//!
//! 逐文档、逐片段驱动 提取 → 生成 → 恢复/回填 → 序列化 的流程，
//! 并以惰性流的形式输出进度事件。
//!
//! ## 状态
//!
//! ```text
//! pending → extracting → error
//!                      → translating → (每个片段一个进度事件)* → finalizing → done
//! ```
//!
//! 片段级失败（后端不可用、重试耗尽、结构化输出无法恢复）不会中断文档：
//! 该片段保持原文，计数照常更新。解析和序列化失败只终止当前文档。
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use dcia::translation::{DocumentOptions, DocumentTranslator, InputDocument, OllamaClient, SegmentTask, TranslationConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new(TranslationConfig::default())?;
//! let translator = DocumentTranslator::new(Arc::new(client));
//! let documents = vec![InputDocument::new("cours.xml", std::fs::read("cours.xml")?)];
//!
//! let events = translator.process_documents(documents, SegmentTask::translate("fr", "en"), DocumentOptions::default());
//! futures::pin_mut!(events);
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::builders::archive::package_results;
use crate::core::{is_xml_filename, output_filename, text_preview, PREVIEW_MAX_CHARS};
use crate::translation::client::{TaskPrompt, TextGenerator};
use crate::translation::config::{SegmentOrder, TranslationConfig};
use crate::translation::error::{helpers, ErrorStats, TranslationError, TranslationResult};
use crate::translation::pipeline::{
    count_translatable_elements, reinject, serialize, set_document_language, CollectorConfig,
    ExtractedDocument, ExtractionMode, SegmentCollector,
};
use crate::translation::recovery::{Correction, Reformulation, StructuredOutput};

use super::report::{SegmentReport, TranslationReport};

/// 片段级任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentTask {
    /// 翻译并更新文档语言
    Translate {
        source_lang: String,
        target_lang: String,
    },
    /// 校对，回填校对后的文本
    Correct,
    /// 改写，回填改写后的文本
    Reformulate,
}

impl SegmentTask {
    pub fn translate(source_lang: &str, target_lang: &str) -> Self {
        SegmentTask::Translate {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }

    /// 输出文件名后缀
    pub fn output_suffix(&self) -> &str {
        match self {
            SegmentTask::Translate { target_lang, .. } => target_lang,
            SegmentTask::Correct => "corrected",
            SegmentTask::Reformulate => "reformulated",
        }
    }

    /// 完成后写入 `xml:lang` 的语言
    pub fn target_language(&self) -> Option<&str> {
        match self {
            SegmentTask::Translate { target_lang, .. } => Some(target_lang),
            _ => None,
        }
    }

    /// 构造片段指令，语言对不受支持时报错
    pub fn prompt(&self, text: &str) -> TranslationResult<TaskPrompt> {
        match self {
            SegmentTask::Translate {
                source_lang,
                target_lang,
            } => TaskPrompt::translate(text, source_lang, target_lang),
            SegmentTask::Correct => Ok(TaskPrompt::correct(text)),
            SegmentTask::Reformulate => Ok(TaskPrompt::reformulate(text)),
        }
    }

    pub fn validate(&self) -> TranslationResult<()> {
        self.prompt("").map(|_| ())
    }
}

/// 文档处理选项
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    /// 覆盖默认模型
    pub model: Option<String>,
    pub mode: ExtractionMode,
    pub order: SegmentOrder,
    pub pretty_print: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            model: None,
            mode: ExtractionMode::WholeUnit,
            order: SegmentOrder::default(),
            pretty_print: false,
        }
    }
}

impl DocumentOptions {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            order: config.segment_order,
            pretty_print: config.pretty_print,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }

    fn collector_config(&self) -> CollectorConfig {
        let base = match self.mode {
            ExtractionMode::DirectText => CollectorConfig::default(),
            ExtractionMode::WholeUnit => CollectorConfig::whole_unit(),
        };
        base.with_order(self.order)
    }
}

/// 待处理的输入文档
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub filename: String,
    pub content: Vec<u8>,
}

impl InputDocument {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// 进度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Translating,
    Done,
    Error,
}

/// 单文档进度
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationProgress {
    pub filename: String,
    pub current_element: usize,
    pub total_elements: usize,
    /// 当前片段预览，最多 50 个字符
    pub current_text: String,
    pub status: ProgressStatus,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TranslationProgress {
    fn translating(filename: &str, index: usize, total: usize, text: &str) -> Self {
        Self {
            filename: filename.to_string(),
            current_element: index,
            total_elements: total,
            current_text: text_preview(text, PREVIEW_MAX_CHARS),
            status: ProgressStatus::Translating,
            error_message: None,
        }
    }

    fn done(filename: &str, total: usize) -> Self {
        Self {
            filename: filename.to_string(),
            current_element: total,
            total_elements: total,
            current_text: String::new(),
            status: ProgressStatus::Done,
            error_message: None,
        }
    }

    fn error(filename: &str, total: usize, message: String) -> Self {
        Self {
            filename: filename.to_string(),
            current_element: 0,
            total_elements: total,
            current_text: String::new(),
            status: ProgressStatus::Error,
            error_message: Some(message),
        }
    }
}

/// 单文档处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentResult {
    pub original_filename: String,
    pub output_filename: String,
    pub output_bytes: Vec<u8>,
    pub elements_translated: usize,
    pub total_word_count: usize,
}

/// 批处理进度事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub file_index: usize,
    pub total_files: usize,
    #[serde(flatten)]
    pub progress: TranslationProgress,
}

/// 批处理完成事件，携带输出文件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub filename: String,
    pub content_type: String,
    pub content_base64: String,
    pub files_translated: usize,
    pub elements_translated: usize,
    pub total_words: usize,
}

/// 批处理事件流中的一项，以 `done` 结束
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Progress(ProgressEvent),
    Complete(CompletionEvent),
    Error { message: String },
    Done,
}

/// 服务统计信息
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub documents_processed: AtomicUsize,
    pub documents_failed: AtomicUsize,
    pub segments_transformed: AtomicUsize,
    pub segments_failed: AtomicUsize,
    errors: Mutex<ErrorStats>,
}

/// 统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub segments_transformed: usize,
    pub segments_failed: usize,
}

impl ServiceStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            segments_transformed: self.segments_transformed.load(Ordering::Relaxed),
            segments_failed: self.segments_failed.load(Ordering::Relaxed),
        }
    }

    /// 按类别和严重程度记录一次失败
    pub fn record_error(&self, error: &TranslationError) {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_error(error);
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 失败的片段和文档占全部已处理单元的比例
    pub fn error_rate(&self) -> f64 {
        let snapshot = self.snapshot();
        let operations = snapshot.documents_processed
            + snapshot.documents_failed
            + snapshot.segments_transformed
            + snapshot.segments_failed;
        self.error_stats().error_rate(operations)
    }
}

/// 文档处理服务
#[derive(Clone)]
pub struct DocumentTranslator {
    generator: Arc<dyn TextGenerator>,
    stats: Arc<ServiceStats>,
}

impl DocumentTranslator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            stats: Arc::new(ServiceStats::default()),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.stats.error_stats()
    }

    pub fn error_rate(&self) -> f64 {
        self.stats.error_rate()
    }

    /// 处理单个文档
    ///
    /// 每个片段输出一个 `translating` 事件，最后输出一个 `done` 事件并附带结果；
    /// 解析失败时只输出一个 `error` 事件。
    pub fn translate_document(
        &self,
        input: InputDocument,
        task: SegmentTask,
        options: DocumentOptions,
    ) -> impl Stream<Item = (TranslationProgress, Option<DocumentResult>)> + Send + 'static {
        let this = self.clone();

        stream! {
            let filename = input.filename.clone();

            if let Err(e) = task.validate() {
                helpers::log_error(&filename, &e);
                this.stats.record_error(&e);
                this.stats.documents_failed.fetch_add(1, Ordering::Relaxed);
                yield (TranslationProgress::error(&filename, 0, e.to_string()), None);
                return;
            }

            let mut collector = SegmentCollector::new(options.collector_config());
            let ExtractedDocument { mut document, segments } = match collector.extract(&input.content) {
                Ok(extracted) => extracted,
                Err(e) => {
                    helpers::log_error(&filename, &e);
                    this.stats.record_error(&e);
                    this.stats.documents_failed.fetch_add(1, Ordering::Relaxed);
                    yield (TranslationProgress::error(&filename, 0, e.to_string()), None);
                    return;
                }
            };

            let total = segments.len();
            let model = options.model.as_deref();
            let mut total_words = 0;
            let mut transformed = 0;
            tracing::info!("开始处理 {} ({} 个片段, 任务 {:?})", filename, total, task);

            for (index, segment) in segments.iter().enumerate() {
                total_words += segment.word_count();
                yield (
                    TranslationProgress::translating(&filename, index + 1, total, &segment.original_text),
                    None,
                );

                // 回填失败时文档未被修改，只影响当前片段
                let outcome = match this.transform(&task, &segment.original_text, model).await {
                    Ok(text) => reinject(&mut document, segment, &text, options.mode).map_err(|e| (e, true)),
                    Err(e) => {
                        let absorbed = e.is_segment_level();
                        Err((e, absorbed))
                    }
                };

                match outcome {
                    Ok(()) => {
                        transformed += 1;
                        this.stats.segments_transformed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err((e, true)) => {
                        this.stats.record_error(&e);
                        this.stats.segments_failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("{} 第 {} 个片段处理失败: {}", filename, index + 1, e);
                    }
                    Err((e, false)) => {
                        // 文档级错误：放弃整个文档
                        helpers::log_error(format!("{} 第 {} 个片段", filename, index + 1), &e);
                        this.stats.record_error(&e);
                        this.stats.documents_failed.fetch_add(1, Ordering::Relaxed);
                        yield (TranslationProgress::error(&filename, total, e.to_string()), None);
                        return;
                    }
                }
            }

            if let Some(lang) = task.target_language() {
                set_document_language(&mut document, lang);
            }

            match serialize(&document, options.pretty_print) {
                Ok(output_bytes) => {
                    this.stats.documents_processed.fetch_add(1, Ordering::Relaxed);
                    tracing::info!("{} 完成: {}/{} 个片段", filename, transformed, total);
                    let result = DocumentResult {
                        output_filename: output_filename(&filename, task.output_suffix()),
                        original_filename: filename.clone(),
                        output_bytes,
                        elements_translated: transformed,
                        total_word_count: total_words,
                    };
                    yield (TranslationProgress::done(&filename, total), Some(result));
                }
                Err(e) => {
                    helpers::log_error(format!("{} 序列化失败", filename), &e);
                    this.stats.record_error(&e);
                    this.stats.documents_failed.fetch_add(1, Ordering::Relaxed);
                    yield (TranslationProgress::error(&filename, total, e.to_string()), None);
                }
            }
        }
    }

    /// 顺序处理多个文档并打包输出
    ///
    /// 一个结果直接输出文档字节，多个结果打包为 ZIP，没有结果时不产生输出文件。
    /// 事件流总是以 `BatchEvent::Done` 结束。
    pub fn process_documents(
        &self,
        documents: Vec<InputDocument>,
        task: SegmentTask,
        options: DocumentOptions,
    ) -> impl Stream<Item = BatchEvent> + Send + 'static {
        let this = self.clone();

        stream! {
            let total_files = documents.len();
            let suffix = task.output_suffix().to_string();
            let mut results = Vec::new();
            tracing::info!("批处理开始: {} 个文档", total_files);

            for (file_index, input) in documents.into_iter().enumerate() {
                let mut events = Box::pin(this.translate_document(input, task.clone(), options.clone()));

                while let Some((progress, result)) = events.next().await {
                    yield BatchEvent::Progress(ProgressEvent {
                        file_index: file_index + 1,
                        total_files,
                        progress,
                    });
                    if let Some(result) = result {
                        results.push(result);
                    }
                }
            }

            match package_results(&results, &suffix) {
                Ok(Some(artifact)) => {
                    tracing::info!("批处理完成: {} ({} 个文档)", artifact.filename, results.len());
                    yield BatchEvent::Complete(CompletionEvent {
                        content_base64: artifact.content_base64(),
                        content_type: artifact.content_type.to_string(),
                        filename: artifact.filename,
                        files_translated: results.len(),
                        elements_translated: results.iter().map(|r| r.elements_translated).sum(),
                        total_words: results.iter().map(|r| r.total_word_count).sum(),
                    });
                }
                Ok(None) => tracing::warn!("批处理没有产生任何输出"),
                Err(e) => {
                    tracing::error!("打包输出失败: {}", e);
                    yield BatchEvent::Error { message: e.to_string() };
                }
            }

            yield BatchEvent::Done;
        }
    }

    /// 逐片段翻译文档直接文本并生成报告
    pub async fn translate_with_report(
        &self,
        content: &[u8],
        source_lang: &str,
        target_lang: &str,
        options: &DocumentOptions,
    ) -> TranslationResult<(Vec<u8>, TranslationReport)> {
        let start = Instant::now();
        let task = SegmentTask::translate(source_lang, target_lang);
        task.validate()?;

        let config = CollectorConfig::default().with_order(options.order);
        let mut collector = SegmentCollector::new(config);
        let ExtractedDocument {
            mut document,
            segments,
        } = collector.extract(content)?;

        let mut report = TranslationReport::new(segments.len(), collector.stats().skipped());
        let model = options.model.as_deref();

        for segment in &segments {
            let locator = segment.locator.to_string();
            let outcome = match self.transform(&task, &segment.original_text, model).await {
                Ok(text) => reinject(&mut document, segment, &text, ExtractionMode::DirectText)
                    .map(|_| text)
                    .map_err(|e| (e, true)),
                Err(e) => {
                    let absorbed = e.is_segment_level();
                    Err((e, absorbed))
                }
            };

            match outcome {
                Ok(text) => {
                    report.record(SegmentReport::succeeded(locator, &segment.original_text, &text))
                }
                Err((e, true)) => {
                    tracing::warn!("片段 {} 翻译失败: {}", locator, e);
                    self.stats.record_error(&e);
                    report.record(SegmentReport::failed(locator, &segment.original_text, e.to_string()))
                }
                Err((e, false)) => {
                    helpers::log_error(format!("片段 {}", locator), &e);
                    self.stats.record_error(&e);
                    return Err(e);
                }
            }
        }

        set_document_language(&mut document, target_lang);
        let output = serialize(&document, options.pretty_print)?;
        report.duration_seconds = start.elapsed().as_secs_f64();

        tracing::info!(
            "翻译完成: {}/{} 成功, {} 失败, {} 忽略, 耗时 {:.2}s",
            report.translated,
            report.total_segments,
            report.failed,
            report.ignored,
            report.duration_seconds
        );

        Ok((output, report))
    }

    /// 对单个片段执行任务，返回要回填的文本
    async fn transform(
        &self,
        task: &SegmentTask,
        text: &str,
        model: Option<&str>,
    ) -> TranslationResult<String> {
        let prompt = task.prompt(text)?;
        let raw = self.generator.generate_text(&prompt, model).await?;

        let output = match task {
            SegmentTask::Translate { .. } => raw,
            SegmentTask::Correct => Correction::from_raw(&raw)?.corrected_text,
            SegmentTask::Reformulate => Reformulation::from_raw(&raw)?.reformulated_text,
        };

        let output = output.trim();
        if output.is_empty() {
            return Err(TranslationError::TransientBackendFailure(
                "backend produced no text for segment".to_string(),
            ));
        }
        Ok(output.to_string())
    }
}

/// 文档预览
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentPreview {
    pub filename: String,
    pub translatable_elements: usize,
}

/// 统计每个 XML 文档中可翻译的段落数，忽略非 `.xml` 文件
pub fn preview_documents(documents: &[InputDocument]) -> Vec<DocumentPreview> {
    documents
        .iter()
        .filter(|d| is_xml_filename(&d.filename))
        .map(|d| DocumentPreview {
            filename: d.filename.clone(),
            translatable_elements: count_translatable_elements(&d.content),
        })
        .collect()
}
