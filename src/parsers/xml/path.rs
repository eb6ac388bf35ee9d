//! 结构化定位路径
//!
//! 从根元素到目标元素的 (标签, 同名兄弟序号) 序列。序号从 1 开始，
//! 元素是父节点下唯一的同名元素时省略。标签使用 Clark 展开名，
//! 保证同一次解析中不同元素的路径互不相同。

use std::fmt;

use super::dom::{NodeId, XmlDocument};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub tag: String,
    pub position: Option<usize>,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{}[{}]", self.tag, position),
            None => write!(f, "{}", self.tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuralPath {
    steps: Vec<PathStep>,
}

impl StructuralPath {
    /// 沿祖先链计算元素的定位路径
    pub fn of(document: &XmlDocument, id: NodeId) -> Self {
        let mut steps = Vec::new();
        let mut current = Some(id);

        while let Some(node) = current {
            let Some(element) = document.element(node) else {
                break;
            };
            let tag = element.expanded_name();

            let position = match document.parent_element(node) {
                Some(parent) => {
                    let siblings: Vec<NodeId> = document
                        .child_elements(parent)
                        .filter(|s| {
                            document
                                .element(*s)
                                .map(|e| e.expanded_name() == tag)
                                .unwrap_or(false)
                        })
                        .collect();
                    if siblings.len() > 1 {
                        siblings.iter().position(|s| *s == node).map(|i| i + 1)
                    } else {
                        None
                    }
                }
                None => None,
            };

            steps.push(PathStep { tag, position });
            current = document.parent_element(node);
        }

        steps.reverse();
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    /// 在文档中查找路径对应的元素
    pub fn resolve(&self, document: &XmlDocument) -> Option<NodeId> {
        let (first, rest) = self.steps.split_first()?;
        let root = document.root();
        if document.element(root)?.expanded_name() != first.tag {
            return None;
        }

        let mut current = root;
        for step in rest {
            let candidates: Vec<NodeId> = document
                .child_elements(current)
                .filter(|c| {
                    document
                        .element(*c)
                        .map(|e| e.expanded_name() == step.tag)
                        .unwrap_or(false)
                })
                .collect();

            current = match step.position {
                Some(position) => *candidates.get(position.checked_sub(1)?)?,
                None if candidates.len() == 1 => candidates[0],
                None => return None,
            };
        }

        Some(current)
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::xml::parse_xml;
    use std::collections::HashSet;

    const DOC: &[u8] = br#"<sc:item xmlns:sc="urn:sc">
        <sc:content>
            <sc:para>one</sc:para>
            <sc:para>two</sc:para>
            <sc:title>only</sc:title>
        </sc:content>
    </sc:item>"#;

    #[test]
    fn test_positions_only_for_repeated_tags() {
        let doc = parse_xml(DOC).unwrap();
        let elements = doc.descendant_elements(doc.root());
        let paths: Vec<String> = elements
            .iter()
            .map(|e| StructuralPath::of(&doc, *e).to_string())
            .collect();

        assert_eq!(paths[0], "/{urn:sc}item/{urn:sc}content");
        assert_eq!(paths[1], "/{urn:sc}item/{urn:sc}content/{urn:sc}para[1]");
        assert_eq!(paths[2], "/{urn:sc}item/{urn:sc}content/{urn:sc}para[2]");
        assert_eq!(paths[3], "/{urn:sc}item/{urn:sc}content/{urn:sc}title");
    }

    #[test]
    fn test_paths_are_unique_and_resolvable() {
        let doc = parse_xml(
            br#"<r><a><b/><b/></a><a><b/><c xmlns="urn:1"/><c xmlns="urn:2"/></a></r>"#,
        )
        .unwrap();
        let elements = doc.descendant_elements(doc.root());
        let mut seen = HashSet::new();

        for element in elements {
            let path = StructuralPath::of(&doc, element);
            assert!(seen.insert(path.to_string()), "duplicate path {}", path);
            assert_eq!(path.resolve(&doc), Some(element));
        }
    }

    #[test]
    fn test_root_path() {
        let doc = parse_xml(b"<root/>").unwrap();
        let path = StructuralPath::of(&doc, doc.root());
        assert_eq!(path.to_string(), "/root");
        assert_eq!(path.depth(), 1);
    }
}
