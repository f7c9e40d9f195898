use crate::{Document, NodeData, NodeKey};
use std::fmt::{self, Write};
use std::sync::OnceLock;

/// Deterministic tree rendering and equality rules for tests that compare a
/// live document with a reconstructed one. Not a stable format.
///
/// Equivalence rules:
/// - Node kinds, element names and namespaces must match.
/// - Attributes are compared as a set; order is ignored.
/// - Text, comments and doctypes must match exactly unless
///   `ignore_whitespace_text` drops whitespace-only text nodes.
/// - Shadow roots and iframe documents are compared as nested children.
#[derive(Clone, Copy, Debug, Default)]
pub struct DomSnapshotOptions {
    pub ignore_whitespace_text: bool,
    pub ignore_comments: bool,
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(doc: &Document, root: NodeKey, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk_snapshot(doc, root, &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn node_line(doc: &Document, key: NodeKey) -> String {
    match doc.data(key) {
        None => format!("<missing {key}>"),
        Some(NodeData::Document { .. }) => "#document".to_string(),
        Some(NodeData::ShadowRoot { .. }) => "#shadow-root".to_string(),
        Some(NodeData::DocumentType {
            name,
            public_id,
            system_id,
        }) => {
            let mut line = format!("<!DOCTYPE {name}");
            if !public_id.is_empty() {
                let _ = write!(&mut line, r#" PUBLIC "{public_id}""#);
            }
            if !system_id.is_empty() {
                let _ = write!(&mut line, r#" "{system_id}""#);
            }
            line.push('>');
            line
        }
        Some(NodeData::Element(el)) => {
            let mut attrs: Vec<_> = el.attributes().iter().collect();
            attrs.sort();
            let mut line = String::from("<");
            if el.namespace() == crate::Namespace::Svg {
                line.push_str("svg:");
            }
            line.push_str(el.tag_name());
            for (k, v) in attrs {
                let _ = write!(&mut line, r#" {k}="{v}""#);
            }
            line.push('>');
            line
        }
        Some(NodeData::Text(text)) => format!("{text:?}"),
        Some(NodeData::CData(text)) => format!("<![CDATA[{text}]]>"),
        Some(NodeData::Comment(text)) => format!("<!--{text}-->"),
    }
}

fn is_skipped(doc: &Document, key: NodeKey, options: &DomSnapshotOptions) -> bool {
    match doc.data(key) {
        Some(NodeData::Text(text)) => options.ignore_whitespace_text && text.trim().is_empty(),
        Some(NodeData::Comment(_)) => options.ignore_comments,
        _ => false,
    }
}

/// Children in comparison order: shadow root, light children, frame content.
fn snapshot_children(doc: &Document, key: NodeKey, options: &DomSnapshotOptions) -> Vec<NodeKey> {
    let mut out = Vec::new();
    out.extend(doc.shadow_root(key));
    out.extend(
        doc.children(key)
            .iter()
            .copied()
            .filter(|&c| !is_skipped(doc, c, options)),
    );
    out.extend(doc.content_document(key));
    out
}

fn walk_snapshot(
    doc: &Document,
    key: NodeKey,
    options: &DomSnapshotOptions,
    depth: usize,
    out: &mut Vec<String>,
) {
    out.push(format!("{}{}", "  ".repeat(depth), node_line(doc, key)));
    for child in snapshot_children(doc, key, options) {
        walk_snapshot(doc, child, options, depth + 1, out);
    }
}

#[derive(Debug)]
pub struct DomMismatch<'a> {
    path: String,
    detail: String,
    expected: (&'a Document, NodeKey),
    actual: (&'a Document, NodeKey),
    options: DomSnapshotOptions,
    expected_subtree: OnceLock<String>,
    actual_subtree: OnceLock<String>,
}

impl DomMismatch<'_> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for DomMismatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected_subtree = self.expected_subtree.get_or_init(|| {
            DomSnapshot::new(self.expected.0, self.expected.1, self.options).render()
        });
        let actual_subtree = self
            .actual_subtree
            .get_or_init(|| DomSnapshot::new(self.actual.0, self.actual.1, self.options).render());
        writeln!(f, "DOM mismatch at {}: {}", self.path, self.detail)?;
        writeln!(f, "expected: {}", node_line(self.expected.0, self.expected.1))?;
        writeln!(f, "actual:   {}", node_line(self.actual.0, self.actual.1))?;
        writeln!(f, "expected subtree:\n{expected_subtree}")?;
        writeln!(f, "actual subtree:\n{actual_subtree}")?;
        Ok(())
    }
}

impl std::error::Error for DomMismatch<'_> {}

pub fn assert_dom_eq(
    expected: (&Document, NodeKey),
    actual: (&Document, NodeKey),
    options: DomSnapshotOptions,
) {
    if let Err(mismatch) = compare_dom(expected, actual, options) {
        panic!("{mismatch}");
    }
}

pub fn compare_dom<'a>(
    expected: (&'a Document, NodeKey),
    actual: (&'a Document, NodeKey),
    options: DomSnapshotOptions,
) -> Result<(), Box<DomMismatch<'a>>> {
    let mut path = vec![node_label(expected.0, expected.1)];
    compare_nodes(expected, actual, &options, &mut path)
}

fn node_label(doc: &Document, key: NodeKey) -> String {
    match doc.data(key) {
        Some(NodeData::Element(el)) => el.tag_name().to_string(),
        Some(NodeData::Document { .. }) => "#document".to_string(),
        Some(NodeData::ShadowRoot { .. }) => "#shadow-root".to_string(),
        Some(NodeData::DocumentType { .. }) => "#doctype".to_string(),
        Some(NodeData::Text(_)) => "#text".to_string(),
        Some(NodeData::CData(_)) => "#cdata".to_string(),
        Some(NodeData::Comment(_)) => "#comment".to_string(),
        None => "#missing".to_string(),
    }
}

fn mismatch<'a>(
    path: &[String],
    detail: impl Into<String>,
    expected: (&'a Document, NodeKey),
    actual: (&'a Document, NodeKey),
    options: &DomSnapshotOptions,
) -> Box<DomMismatch<'a>> {
    Box::new(DomMismatch {
        path: path.join(" > "),
        detail: detail.into(),
        expected,
        actual,
        options: *options,
        expected_subtree: OnceLock::new(),
        actual_subtree: OnceLock::new(),
    })
}

fn compare_nodes<'a>(
    expected: (&'a Document, NodeKey),
    actual: (&'a Document, NodeKey),
    options: &DomSnapshotOptions,
    path: &mut Vec<String>,
) -> Result<(), Box<DomMismatch<'a>>> {
    let expected_line = node_line(expected.0, expected.1);
    let actual_line = node_line(actual.0, actual.1);
    if expected_line != actual_line {
        return Err(mismatch(path, "node differs", expected, actual, options));
    }

    let expected_children = snapshot_children(expected.0, expected.1, options);
    let actual_children = snapshot_children(actual.0, actual.1, options);
    if expected_children.len() != actual_children.len() {
        return Err(mismatch(
            path,
            format!(
                "child count {} != {}",
                expected_children.len(),
                actual_children.len()
            ),
            expected,
            actual,
            options,
        ));
    }
    for (i, (&e, &a)) in expected_children.iter().zip(&actual_children).enumerate() {
        path.push(format!("{}[{i}]", node_label(expected.0, e)));
        compare_nodes((expected.0, e), (actual.0, a), options, path)?;
        path.pop();
    }
    Ok(())
}
