//! Loading markup into a [`Document`].

mod entities;
mod tokenizer;

pub use tokenizer::{Token, tokenize};

use crate::{Document, DomError, Namespace, NodeKey};

/// Parses a complete page. The returned document has no pending records.
pub fn parse_document(input: &str) -> Document {
    let mut doc = Document::new();
    doc.set_observing(false);
    let root = doc.root();
    if let Err(err) = parse_into(&mut doc, root, input) {
        log::warn!(target: "dom.markup", "markup load stopped early: {err}");
    }
    doc.set_observing(true);
    doc
}

/// Parses `input` and appends the resulting nodes under `parent`, recording
/// each insertion when the document is observed. Returns the top-level nodes
/// that were appended.
pub fn parse_into(doc: &mut Document, parent: NodeKey, input: &str) -> Result<Vec<NodeKey>, DomError> {
    let parent_is_svg = doc
        .element(parent)
        .is_some_and(|el| el.namespace() == Namespace::Svg);
    let mut open: Vec<(NodeKey, bool)> = Vec::new();
    let mut top_level = Vec::new();

    for token in tokenize(input) {
        let (current, in_svg) = open.last().copied().unwrap_or((parent, parent_is_svg));
        let created = match token {
            Token::Doctype(raw) => {
                let (name, public_id, system_id) = parse_doctype(&raw);
                Some(doc.create_doctype(&name, &public_id, &system_id))
            }
            Token::Comment(text) => Some(doc.create_comment(&text)),
            Token::CData(text) => Some(doc.create_cdata(&text)),
            Token::Text(text) => Some(doc.create_text(&text)),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let svg = in_svg || name == "svg";
                let namespace = if svg { Namespace::Svg } else { Namespace::Html };
                let element = doc.create_element_ns(&name, namespace);
                {
                    // Attributes on a fresh, detached element are not observable.
                    let observing = doc.is_observing();
                    doc.set_observing(false);
                    for (attr, value) in &attributes {
                        doc.set_attribute(element, attr, value)?;
                    }
                    doc.set_observing(observing);
                }
                doc.append_child(current, element)?;
                if current == parent {
                    top_level.push(element);
                }
                if !self_closing {
                    open.push((element, svg));
                }
                None
            }
            Token::EndTag(name) => {
                if let Some(pos) = open
                    .iter()
                    .rposition(|&(key, _)| doc.tag_name(key) == Some(name.as_str()))
                {
                    open.truncate(pos);
                }
                None
            }
        };
        if let Some(node) = created {
            doc.append_child(current, node)?;
            if current == parent {
                top_level.push(node);
            }
        }
    }
    Ok(top_level)
}

/// Splits `DOCTYPE html PUBLIC "pub" "sys"` into name and identifiers.
fn parse_doctype(raw: &str) -> (String, String, String) {
    let body = raw
        .get(..7)
        .filter(|head| head.eq_ignore_ascii_case("doctype"))
        .map_or(raw, |_| &raw[7..])
        .trim();
    let (name, rest) = body
        .split_once(char::is_whitespace)
        .unwrap_or((body, ""));
    let quoted: Vec<&str> = rest.split(['"', '\'']).skip(1).step_by(2).collect();
    let rest_upper = rest.trim_start().to_ascii_uppercase();
    let (public_id, system_id) = if rest_upper.starts_with("PUBLIC") {
        (
            quoted.first().copied().unwrap_or(""),
            quoted.get(1).copied().unwrap_or(""),
        )
    } else if rest_upper.starts_with("SYSTEM") {
        ("", quoted.first().copied().unwrap_or(""))
    } else {
        ("", "")
    };
    (
        name.to_ascii_lowercase(),
        public_id.to_string(),
        system_id.to_string(),
    )
}
