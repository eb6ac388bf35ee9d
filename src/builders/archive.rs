//! 输出文件构建
//!
//! 单个文档直接输出其字节，多个文档打包为 ZIP，每个文档一个条目。

use std::collections::HashSet;
use std::io::{Cursor, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::output_filename;
use crate::translation::core::DocumentResult;
use crate::translation::error::TranslationResult;

pub const XML_CONTENT_TYPE: &str = "application/xml";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// 最终输出文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn is_archive(&self) -> bool {
        self.content_type == ZIP_CONTENT_TYPE
    }

    pub fn content_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// 将 (条目名, 内容) 写入 ZIP，重名条目追加序号
pub fn create_zip<'a, I>(entries: I) -> TranslationResult<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used = HashSet::new();

    for (name, content) in entries {
        let mut entry_name = name.to_string();
        let mut counter = 2;
        while !used.insert(entry_name.clone()) {
            entry_name = output_filename(name, &counter.to_string());
            counter += 1;
        }

        writer.start_file(entry_name.as_str(), options)?;
        writer.write_all(content)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// 按结果数量选择输出形式，没有结果时返回 `None`
pub fn package_results(
    results: &[DocumentResult],
    suffix: &str,
) -> TranslationResult<Option<OutputArtifact>> {
    match results {
        [] => Ok(None),
        [single] => Ok(Some(OutputArtifact {
            filename: single.output_filename.clone(),
            content_type: XML_CONTENT_TYPE,
            bytes: single.output_bytes.clone(),
        })),
        many => {
            let bytes = create_zip(
                many.iter()
                    .map(|r| (r.output_filename.as_str(), r.output_bytes.as_slice())),
            )?;
            tracing::info!("已打包 {} 个文档 ({} 字节)", many.len(), bytes.len());

            Ok(Some(OutputArtifact {
                filename: format!("translations_{}.zip", suffix),
                content_type: ZIP_CONTENT_TYPE,
                bytes,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn result(name: &str, body: &str) -> DocumentResult {
        DocumentResult {
            original_filename: name.to_string(),
            output_filename: output_filename(name, "en"),
            output_bytes: body.as_bytes().to_vec(),
            elements_translated: 1,
            total_word_count: 2,
        }
    }

    #[test]
    fn test_no_results_no_artifact() {
        assert!(package_results(&[], "en").unwrap().is_none());
    }

    #[test]
    fn test_single_result_is_raw_xml() {
        let artifact = package_results(&[result("a.xml", "<a/>")], "en").unwrap().unwrap();
        assert_eq!(artifact.filename, "a_en.xml");
        assert_eq!(artifact.content_type, XML_CONTENT_TYPE);
        assert_eq!(artifact.bytes, b"<a/>");
        assert_eq!(artifact.content_base64(), "PGEvPg==");
    }

    #[test]
    fn test_multiple_results_are_zipped() {
        let results = vec![
            result("a.xml", "<a/>"),
            result("b.xml", "<b/>"),
            result("c.xml", "<c/>"),
        ];
        let artifact = package_results(&results, "en").unwrap().unwrap();
        assert!(artifact.is_archive());
        assert_eq!(artifact.filename, "translations_en.zip");

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        let mut content = String::new();
        archive.by_name("b_en.xml").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "<b/>");
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let bytes = create_zip(vec![("x.xml", &b"1"[..]), ("x.xml", &b"2"[..])]).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["x.xml", "x_2.xml"]);
    }
}
