use crate::{Document, NodeData, NodeKey};

const INDENT_STEP: &str = "  ";
const PREVIEW_CHARS: usize = 40;

fn trimmed_nonempty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn push_preview(out: &mut String, s: &str, max_chars: usize) {
    for (i, ch) in s.chars().enumerate() {
        if i == max_chars {
            out.push('…');
            return;
        }
        out.push(if ch == '\n' { ' ' } else { ch });
    }
}

/// Human-readable outline of the subtree under `root`, at most `cap` lines.
/// Whitespace-only text is skipped; iframe documents and shadow roots are
/// nested under their host.
pub fn outline(doc: &Document, root: NodeKey, cap: usize) -> Vec<String> {
    fn walk(doc: &Document, key: NodeKey, depth: usize, out: &mut Vec<String>, left: &mut usize) {
        if *left == 0 {
            return;
        }
        let indent = INDENT_STEP.repeat(depth);
        let mut line = String::with_capacity(indent.len() + 64);
        line.push_str(&indent);
        match doc.data(key) {
            None => return,
            Some(NodeData::Document { .. }) => line.push_str("#document"),
            Some(NodeData::ShadowRoot { .. }) => line.push_str("#shadow-root"),
            Some(NodeData::DocumentType { name, .. }) => {
                line.push_str("<!DOCTYPE ");
                line.push_str(name);
                line.push('>');
            }
            Some(NodeData::Element(el)) => {
                line.push('<');
                line.push_str(el.tag_name());
                for attr in ["id", "class"] {
                    if let Some(value) = el.attribute(attr).filter(|v| !v.is_empty()) {
                        line.push(' ');
                        line.push_str(attr);
                        line.push_str("=\"");
                        line.push_str(value);
                        line.push('"');
                    }
                }
                line.push('>');
            }
            Some(NodeData::Text(text)) | Some(NodeData::CData(text)) => {
                let Some(trimmed) = trimmed_nonempty(text) else {
                    return;
                };
                line.push('"');
                push_preview(&mut line, trimmed, PREVIEW_CHARS);
                line.push('"');
            }
            Some(NodeData::Comment(text)) => {
                line.push_str("<!-- ");
                push_preview(&mut line, text, PREVIEW_CHARS);
                line.push_str(" -->");
            }
        }
        *left -= 1;
        out.push(line);

        if let Some(shadow) = doc.shadow_root(key) {
            walk(doc, shadow, depth + 1, out, left);
        }
        for &child in doc.children(key) {
            walk(doc, child, depth + 1, out, left);
        }
        if let Some(content) = doc.content_document(key) {
            walk(doc, content, depth + 1, out, left);
        }
    }

    let mut out = Vec::new();
    let mut left = cap;
    walk(doc, root, 0, &mut out, &mut left);
    out
}
