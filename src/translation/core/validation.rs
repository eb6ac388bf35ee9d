//! 请求参数校验

use crate::translation::config::is_supported_language;
use crate::translation::error::{helpers::validation_error, TranslationResult};

/// 文本不能为空白
pub fn validate_text(text: &str, what: &str) -> TranslationResult<()> {
    if text.trim().is_empty() {
        return Err(validation_error(format!("{} cannot be empty", what)));
    }
    Ok(())
}

/// 语言对必须受支持且不相同
pub fn validate_language_pair(source_lang: &str, target_lang: &str) -> TranslationResult<()> {
    if !is_supported_language(source_lang) {
        return Err(validation_error(format!(
            "Unsupported source language: {}",
            source_lang
        )));
    }
    if !is_supported_language(target_lang) {
        return Err(validation_error(format!(
            "Unsupported target language: {}",
            target_lang
        )));
    }
    if source_lang == target_lang {
        return Err(validation_error(
            "Source and target languages must be different",
        ));
    }
    Ok(())
}

/// 上传大小限制
pub fn validate_upload_size(size: usize, max_upload_mb: usize) -> TranslationResult<()> {
    let limit = max_upload_mb.saturating_mul(1024 * 1024);
    if size > limit {
        return Err(validation_error(format!(
            "upload of {} bytes exceeds the {} MB limit",
            size, max_upload_mb
        )));
    }
    Ok(())
}
