use encoding_rs::UTF_8;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::dom::{NodeId, NodeKind, XmlDocument};
use super::XmlError;

/// 序列化选项
#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions {
    /// 缩进输出。开启后丢弃纯空白文本节点
    pub pretty_print: bool,
    /// 源文档没有声明时是否补写 XML 声明
    pub xml_declaration: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            pretty_print: false,
            xml_declaration: true,
        }
    }
}

/// 序列化文档，按输入编码输出
pub fn serialize_document(
    document: &XmlDocument,
    options: &SerializeOptions,
) -> Result<Vec<u8>, XmlError> {
    let output_encoding = document.encoding().output_encoding();
    let mut writer = if options.pretty_print {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };

    match document.declaration() {
        Some(declaration) if output_encoding == document.encoding() => {
            // 原样写回，保留引号和空白
            let content = BytesStart::from_content(declaration.raw.as_str(), 3);
            write(&mut writer, Event::Decl(BytesDecl::from_start(content)))?;
        }
        Some(declaration) => {
            // UTF-16 等无法直接写出的编码按 UTF-8 输出，声明随之改写
            write(
                &mut writer,
                Event::Decl(BytesDecl::new(
                    &declaration.version,
                    Some(output_encoding.name()),
                    declaration.standalone.as_deref(),
                )),
            )?;
        }
        None if options.xml_declaration => {
            write(
                &mut writer,
                Event::Decl(BytesDecl::new("1.0", Some(output_encoding.name()), None)),
            )?;
            if !options.pretty_print {
                write(&mut writer, Event::Text(BytesText::from_escaped("\n")))?;
            }
        }
        None => {}
    }

    for child in document.children(document.document_node()) {
        write_node(document, *child, &mut writer, options)?;
    }

    let mut buf = writer.into_inner();
    if options.pretty_print && !buf.ends_with(b"\n") {
        buf.push(b'\n');
    }

    if output_encoding == UTF_8 {
        if document.had_bom() {
            let mut with_bom = vec![0xEF, 0xBB, 0xBF];
            with_bom.extend_from_slice(&buf);
            return Ok(with_bom);
        }
        return Ok(buf);
    }

    let text = String::from_utf8(buf).map_err(|e| XmlError::Serialize(e.to_string()))?;
    let (encoded, _, _) = output_encoding.encode(&text);
    Ok(encoded.into_owned())
}

fn write_node(
    document: &XmlDocument,
    id: NodeId,
    writer: &mut Writer<Vec<u8>>,
    options: &SerializeOptions,
) -> Result<(), XmlError> {
    match document.kind(id) {
        NodeKind::Document => {}
        NodeKind::Element(element) => {
            let mut content = element.name.clone();
            for attr in &element.attributes {
                let quote = attr.quote.as_char();
                content.push(' ');
                content.push_str(&attr.name);
                content.push('=');
                content.push(quote);
                content.push_str(&attr.value);
                content.push(quote);
            }
            let start = BytesStart::from_content(content, element.name.len());

            let children = document.children(id);
            if children.is_empty() && element.self_closing {
                write(writer, Event::Empty(start))?;
            } else {
                write(writer, Event::Start(start))?;
                for child in children {
                    write_node(document, *child, writer, options)?;
                }
                write(writer, Event::End(BytesEnd::new(element.name.as_str())))?;
            }
        }
        NodeKind::Text(raw) => {
            if options.pretty_print && raw.trim().is_empty() {
                return Ok(());
            }
            write(writer, Event::Text(BytesText::from_escaped(raw.as_str())))?;
        }
        NodeKind::CData(data) => {
            write(writer, Event::CData(BytesCData::new(data.as_str())))?;
        }
        NodeKind::Comment(raw) => {
            write(writer, Event::Comment(BytesText::from_escaped(raw.as_str())))?;
        }
        NodeKind::ProcessingInstruction(raw) => {
            write(writer, Event::PI(BytesText::from_escaped(raw.as_str())))?;
        }
        NodeKind::DocType(raw) => {
            write(writer, Event::DocType(BytesText::from_escaped(raw.as_str())))?;
        }
    }
    Ok(())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::xml::parse_xml;

    #[test]
    fn test_round_trip_is_byte_identical() {
        let input = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- note -->\n<sc:item xmlns:sc=\"urn:sc\" xml:lang=\"fr\">\n    <sc:para>A &amp; B</sc:para>\n    <empty/>\n    <![CDATA[x < y]]>\n</sc:item>";
        let doc = parse_xml(input.as_bytes()).unwrap();
        let output = serialize_document(&doc, &SerializeOptions::default()).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), input);
    }

    #[test]
    fn test_single_quotes_survive_round_trip() {
        let input = "<?xml version='1.0' encoding='utf-8'?>\n<a x='1' y=\"2\" z='say \"hi\"'/>";
        let doc = parse_xml(input.as_bytes()).unwrap();
        let output = serialize_document(&doc, &SerializeOptions::default()).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), input);
    }

    #[test]
    fn test_entity_references_written_back() {
        let input = "<!DOCTYPE x [<!ENTITY foo \"bar\">]>\n<x>&foo; et &amp;</x>";
        let doc = parse_xml(input.as_bytes()).unwrap();
        let output = serialize_document(
            &doc,
            &SerializeOptions {
                pretty_print: false,
                xml_declaration: false,
            },
        )
        .unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), input);
    }

    #[test]
    fn test_declaration_added_when_missing() {
        let doc = parse_xml(b"<a>x</a>").unwrap();
        let output = serialize_document(&doc, &SerializeOptions::default()).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a>x</a>"
        );
    }

    #[test]
    fn test_latin1_output_keeps_encoding() {
        let mut data = br#"<?xml version="1.0" encoding="ISO-8859-1"?><p>caf"#.to_vec();
        data.push(0xE9);
        data.extend_from_slice(b"</p>");

        let doc = parse_xml(&data).unwrap();
        let output = serialize_document(&doc, &SerializeOptions::default()).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn test_pretty_print_indents() {
        let doc = parse_xml(b"<a>\n<b>x</b>\n</a>").unwrap();
        let options = SerializeOptions {
            pretty_print: true,
            xml_declaration: false,
        };
        let output = String::from_utf8(serialize_document(&doc, &options).unwrap()).unwrap();
        assert!(output.contains("\n  <b>x</b>"));
    }
}
