//! NDJSON 流式响应
//!
//! 将 `/api/generate` 的分块响应转换为文本片段流。每行是一个
//! `{"response": "...", "done": bool}` 记录。流在收到 `done`、连接关闭
//! 或出错时结束；任何结束路径（包括调用方提前丢弃）都会释放底层连接。
//! 流持有熔断器许可，结果在流结束时上报。

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use super::breaker::BreakerPermit;
use super::request::GenerateResponse;
use crate::translation::error::{TranslationError, TranslationResult};

type ByteStream = Pin<Box<dyn Stream<Item = TranslationResult<Bytes>> + Send>>;

/// 生成文本片段流，有限且不可重启
pub struct GenerationStream {
    inner: Option<ByteStream>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    permit: Option<BreakerPermit>,
    finished: bool,
}

impl GenerationStream {
    pub(crate) fn new<S, E>(byte_stream: S, permit: BreakerPermit) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<TranslationError>,
    {
        Self {
            inner: Some(Box::pin(byte_stream.map(|chunk| chunk.map_err(Into::into)))),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            permit: Some(permit),
            finished: false,
        }
    }

    /// 流是否已经结束
    pub fn is_finished(&self) -> bool {
        self.finished && self.pending.is_empty()
    }

    /// 收集全部片段
    pub async fn collect_text(mut self) -> TranslationResult<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    /// 释放连接。尚未上报结果时归还熔断器的探测许可
    pub fn close(&mut self) {
        self.inner = None;
        self.buffer.clear();
        self.finished = true;
        // 丢弃许可即归还探测名额
        self.permit = None;
    }

    fn complete(&mut self) {
        if let Some(permit) = self.permit.take() {
            permit.success();
            tracing::debug!("流式生成完成");
        }
        self.inner = None;
        self.buffer.clear();
        self.finished = true;
    }

    fn fail(&mut self, error: &TranslationError) {
        if let Some(permit) = self.permit.take() {
            permit.failure();
            tracing::warn!("流式生成失败: {}", error);
        }
        self.inner = None;
        self.buffer.clear();
        self.finished = true;
    }

    /// 解析缓冲区中完整的行
    fn drain_lines(&mut self) -> TranslationResult<()> {
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if self.handle_line(&line)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// 返回 true 表示收到结束记录
    fn handle_line(&mut self, line: &[u8]) -> TranslationResult<bool> {
        let line = std::str::from_utf8(line).map_err(|e| {
            TranslationError::TransientBackendFailure(format!("invalid UTF-8 in stream: {}", e))
        })?;
        let line = line.trim();
        if line.is_empty() {
            return Ok(false);
        }

        let record: GenerateResponse = serde_json::from_str(line).map_err(|e| {
            TranslationError::TransientBackendFailure(format!(
                "failed to decode stream record: {} (line: {})",
                e,
                line.chars().take(200).collect::<String>()
            ))
        })?;

        if !record.response.is_empty() {
            self.pending.push_back(record.response);
        }
        if record.done {
            self.complete();
        }
        Ok(record.done)
    }
}

impl Stream for GenerationStream {
    type Item = TranslationResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(fragment) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(fragment)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            let Some(inner) = this.inner.as_mut() else {
                this.finished = true;
                return Poll::Ready(None);
            };

            match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buffer.extend_from_slice(&chunk);
                    if let Err(e) = this.drain_lines() {
                        this.fail(&e);
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.fail(&e);
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    // 连接关闭：处理没有换行结尾的最后一行
                    let rest = std::mem::take(&mut this.buffer);
                    if let Err(e) = this.handle_line(&rest) {
                        this.fail(&e);
                        return Poll::Ready(Some(Err(e)));
                    }
                    this.complete();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.close();
    }
}
