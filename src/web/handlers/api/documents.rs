//! SCENARI 文档 API：预览和带进度流的处理

use std::sync::Arc;

use axum::{
    extract::{Json as ExtractJson, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;

use super::{error_response, ApiError};
use crate::core::is_xml_filename;
use crate::translation::core::{preview_documents, validate_upload_size};
use crate::translation::error::helpers::validation_error;
use crate::translation::{DocumentOptions, InputDocument, SegmentTask, TranslationResult};
use crate::web::types::{
    AppState, DocumentPayload, DocumentTaskKind, DocumentTranslateRequest, PreviewRequest,
    PreviewResponse,
};

/// 解码上传的文档并检查总大小
fn decode_documents(
    payloads: Vec<DocumentPayload>,
    max_upload_mb: usize,
) -> TranslationResult<Vec<InputDocument>> {
    let mut documents = Vec::with_capacity(payloads.len());
    let mut total_size = 0;

    for payload in payloads {
        let content = STANDARD
            .decode(payload.content_base64.trim().as_bytes())
            .map_err(|e| validation_error(format!("{}: invalid base64 content: {}", payload.filename, e)))?;
        total_size += content.len();
        validate_upload_size(total_size, max_upload_mb)?;
        documents.push(InputDocument::new(payload.filename, content));
    }

    Ok(documents)
}

pub async fn preview(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let documents =
        decode_documents(request.documents, state.max_upload_mb()).map_err(error_response)?;

    let files = preview_documents(&documents);
    let total_elements = files.iter().map(|f| f.translatable_elements).sum();

    Ok(Json(PreviewResponse {
        files,
        total_elements,
    }))
}

/// 处理文档，以 SSE 逐条推送批处理事件，最后一条为 `done`
pub async fn translate_documents(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<DocumentTranslateRequest>,
) -> Result<Response, ApiError> {
    let task = match request.task {
        DocumentTaskKind::Translate => {
            SegmentTask::translate(&request.source_lang, &request.target_lang)
        }
        DocumentTaskKind::Correct => SegmentTask::Correct,
        DocumentTaskKind::Reformulate => SegmentTask::Reformulate,
    };
    task.validate().map_err(error_response)?;

    let documents: Vec<InputDocument> = decode_documents(request.documents, state.max_upload_mb())
        .map_err(error_response)?
        .into_iter()
        .filter(|doc| {
            let keep = is_xml_filename(&doc.filename);
            if !keep {
                tracing::warn!("跳过非 XML 文件: {}", doc.filename);
            }
            keep
        })
        .collect();

    if documents.is_empty() {
        return Err(error_response(validation_error("No XML documents provided")));
    }

    tracing::info!("文档处理请求: {} 个文档, 任务 {:?}", documents.len(), task);

    let options = DocumentOptions::from_config(state.client.config()).with_model(request.model);
    let events = state
        .translator
        .process_documents(documents, task, options)
        .map(|event| Event::default().json_data(&event));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}
