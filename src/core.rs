use chrono::{SecondsFormat, Utc};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Represents errors that can occur at the application boundary
///
/// Library components return `TranslationError`; binaries and the web layer
/// collapse those into this message-carrying type.
#[derive(Debug)]
pub struct DciaError {
    details: String,
}

impl DciaError {
    /// Creates a new DciaError with the given message
    pub fn new(msg: &str) -> DciaError {
        DciaError {
            details: msg.to_string(),
        }
    }
}

impl fmt::Display for DciaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl Error for DciaError {}

impl From<std::io::Error> for DciaError {
    fn from(error: std::io::Error) -> Self {
        DciaError::new(&error.to_string())
    }
}

/// Maximum number of characters shown in a progress preview
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Builds the output file name for a processed document
///
/// The suffix (usually the target language code) is appended to the stem,
/// keeping the last extension: `doc.xml` becomes `doc_en.xml`, a name without
/// extension becomes `name_en`.
///
/// # Examples
///
/// ```
/// use dcia::core::output_filename;
///
/// assert_eq!(output_filename("test.xml", "en"), "test_en.xml");
/// assert_eq!(output_filename("README", "ar"), "README_ar");
/// ```
pub fn output_filename(filename: &str, suffix: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, extension)) => format!("{}_{}.{}", stem, suffix, extension),
        None => format!("{}_{}", filename, suffix),
    }
}

/// Shortens text for progress reporting, appending "..." when truncated
pub fn text_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Counts whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Checks whether a file name carries an `.xml` extension (case-insensitive)
pub fn is_xml_filename(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Current time as an RFC 3339 timestamp
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview("short", 50), "short");
        let long = "a".repeat(60);
        let preview = text_preview(&long, 50);
        assert_eq!(preview.len(), 53);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_text_preview_counts_characters() {
        let arabic = "ب".repeat(51);
        assert_eq!(text_preview(&arabic, 50).chars().count(), 53);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  Premier paragraphe\n en français. "), 4);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_is_xml_filename() {
        assert!(is_xml_filename("doc.xml"));
        assert!(is_xml_filename("DOC.XML"));
        assert!(!is_xml_filename("doc.txt"));
        assert!(!is_xml_filename("xml"));
    }
}
