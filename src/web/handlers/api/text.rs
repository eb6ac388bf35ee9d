//! 文本级 API：翻译、校对、改写、会议纪要

use std::sync::Arc;

use axum::{
    extract::{Json as ExtractJson, State},
    response::Json,
};

use super::{error_response, ApiError};
use crate::translation::core::{validate_language_pair, validate_text};
use crate::translation::{Correction, MeetingSummary, Reformulation};
use crate::web::types::{
    AppState, MeetingSummaryRequest, TextRequest, TranslateTextRequest, TranslateTextResponse,
};

pub async fn translate_text(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<TranslateTextRequest>,
) -> Result<Json<TranslateTextResponse>, ApiError> {
    validate_text(&request.text, "Text to translate").map_err(error_response)?;
    validate_language_pair(&request.source_lang, &request.target_lang).map_err(error_response)?;

    let model = request
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.client.default_model().to_string());

    tracing::info!(
        "文本翻译: {} -> {} ({} 字符)",
        request.source_lang,
        request.target_lang,
        request.text.chars().count()
    );

    let translated_text = state
        .client
        .translate(
            &request.text,
            &request.source_lang,
            &request.target_lang,
            Some(&model),
        )
        .await
        .map_err(error_response)?;

    Ok(Json(TranslateTextResponse {
        translated_text,
        source_lang: request.source_lang,
        target_lang: request.target_lang,
        model,
    }))
}

pub async fn correct_text(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<TextRequest>,
) -> Result<Json<Correction>, ApiError> {
    validate_text(&request.text, "Text to correct").map_err(error_response)?;

    let correction = state
        .client
        .correct(&request.text, request.model.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(correction))
}

pub async fn reformulate_text(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<TextRequest>,
) -> Result<Json<Reformulation>, ApiError> {
    validate_text(&request.text, "Text to reformulate").map_err(error_response)?;

    let reformulation = state
        .client
        .reformulate(&request.text, request.model.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(reformulation))
}

pub async fn meeting_summary(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<MeetingSummaryRequest>,
) -> Result<Json<MeetingSummary>, ApiError> {
    validate_text(&request.notes, "Meeting notes").map_err(error_response)?;

    let summary = state
        .client
        .summarize(&request.notes, request.model.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(summary))
}
