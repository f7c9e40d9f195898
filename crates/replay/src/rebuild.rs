//! Builds live nodes from serialized snapshot trees.
//!
//! Construction is top-down: each serialized node becomes an empty node of
//! the same kind, is registered in the mirror under its recorded id, and its
//! children are built and appended in order. The synthetic `rr_*` and
//! `_cssText` attributes are turned back into host state here.

use dom::{Document, DomError, Namespace, NodeKey, NodeKind};
use events::{SerializedData, SerializedNode};
use snapshot::{Mirror, NodeMeta};

/// Rebuilds a full snapshot into a fresh document. The serialized root must
/// be a document node; its id is mapped to [`Document::root`].
pub fn rebuild(node: &SerializedNode) -> Option<(Document, Mirror)> {
    let SerializedData::Document { compat_mode } = &node.data else {
        log::warn!(target: "replay.rebuild", "snapshot root {} is not a document", node.id);
        return None;
    };
    let mut doc = Document::new();
    doc.set_observing(false);
    let mut mirror = Mirror::new();
    let root = doc.root();
    if let Err(err) = doc.set_compat_mode(root, compat_mode.clone()) {
        log::warn!(target: "replay.rebuild", "cannot set compat mode: {err}");
    }
    mirror.add(root, NodeMeta::from(node));
    build_children(&mut doc, &mut mirror, root, node);
    Some((doc, mirror))
}

/// Builds `node` and its subtree detached from any parent. Nested documents
/// are created as standalone document nodes for the caller to attach to a
/// frame.
pub fn build_node(doc: &mut Document, mirror: &mut Mirror, node: &SerializedNode) -> NodeKey {
    let key = match &node.data {
        SerializedData::Document { compat_mode } => {
            let key = doc.create_document();
            if let Err(err) = doc.set_compat_mode(key, compat_mode.clone()) {
                log::warn!(target: "replay.rebuild", "cannot set compat mode on {}: {err}", node.id);
            }
            key
        }
        SerializedData::DocumentType {
            name,
            public_id,
            system_id,
        } => doc.create_doctype(name, public_id, system_id),
        SerializedData::Element {
            tag_name,
            attributes,
            is_svg,
            is_shadow_host,
            ..
        } => {
            let inline_css = attributes.get("_cssText");
            let key = match (tag_name.as_str(), inline_css) {
                ("link", Some(css)) => {
                    let style = doc.create_element("style");
                    let text = doc.create_text(css);
                    append(doc, style, text);
                    style
                }
                _ => {
                    let namespace = if *is_svg { Namespace::Svg } else { Namespace::Html };
                    doc.create_element_ns(tag_name, namespace)
                }
            };
            for (name, value) in attributes {
                if name == "_cssText" {
                    if tag_name == "style" {
                        let text = doc.create_text(value);
                        append(doc, key, text);
                    }
                    continue;
                }
                if let Err(err) = apply_attribute(doc, key, name, Some(value)) {
                    log::debug!(target: "replay.rebuild", "attribute {name} on {}: {err}", node.id);
                }
            }
            if *is_shadow_host {
                if let Err(err) = doc.attach_shadow(key) {
                    log::debug!(target: "replay.rebuild", "shadow root on {}: {err}", node.id);
                }
            }
            key
        }
        SerializedData::Text { text_content, .. } => doc.create_text(text_content),
        SerializedData::CData { text_content } => doc.create_cdata(text_content),
        SerializedData::Comment { text_content } => doc.create_comment(text_content),
    };
    mirror.add(key, NodeMeta::from(node));
    build_children(doc, mirror, key, node);
    key
}

fn build_children(doc: &mut Document, mirror: &mut Mirror, key: NodeKey, node: &SerializedNode) {
    for child in &node.child_nodes {
        if matches!(child.data, SerializedData::Document { .. }) {
            attach_content(doc, mirror, key, child);
            continue;
        }
        let container = if child.is_shadow {
            match shadow_container(doc, key) {
                Ok(shadow) => shadow,
                Err(err) => {
                    log::warn!(target: "replay.rebuild", "shadow child {} dropped: {err}", child.id);
                    continue;
                }
            }
        } else {
            key
        };
        let child_key = build_node(doc, mirror, child);
        if let Err(err) = doc.append_child(container, child_key) {
            log::warn!(target: "replay.rebuild", "cannot append {} under {}: {err}", child.id, node.id);
            mirror.remove_node_from_map(doc, child_key);
        }
    }
}

/// Builds `content` as the loaded document of `frame`. A document nested
/// directly in a serialized element is that element's frame content.
pub(crate) fn attach_content(
    doc: &mut Document,
    mirror: &mut Mirror,
    frame: NodeKey,
    content: &SerializedNode,
) -> Option<NodeKey> {
    let key = build_node(doc, mirror, content);
    let attached = doc
        .set_content_document(frame, key)
        .and_then(|()| doc.mark_loaded(frame));
    match attached {
        Ok(()) => Some(key),
        Err(err) => {
            log::warn!(target: "replay.rebuild", "cannot attach document {}: {err}", content.id);
            mirror.remove_node_from_map(doc, key);
            None
        }
    }
}

/// Unmaps `node`, its descendants and the content of any frames below it.
pub(crate) fn forget_subtree(doc: &Document, mirror: &mut Mirror, node: NodeKey) {
    let frames: Vec<NodeKey> = std::iter::once(node)
        .chain(doc.descendants(node))
        .filter_map(|k| doc.content_document(k))
        .collect();
    for content in frames {
        forget_subtree(doc, mirror, content);
    }
    mirror.remove_node_from_map(doc, node);
}

fn append(doc: &mut Document, parent: NodeKey, child: NodeKey) {
    if let Err(err) = doc.append_child(parent, child) {
        log::warn!(target: "replay.rebuild", "cannot append {child} under {parent}: {err}");
    }
}

/// The shadow root of `host`, attaching one when missing.
pub(crate) fn shadow_container(doc: &mut Document, host: NodeKey) -> Result<NodeKey, DomError> {
    match doc.shadow_root(host) {
        Some(shadow) => Ok(shadow),
        None => doc.attach_shadow(host),
    }
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").trim().parse().ok()
}

/// Applies one recorded attribute to a live element, translating the
/// synthetic attributes into element state. `None` removes the attribute.
pub(crate) fn apply_attribute(
    doc: &mut Document,
    node: NodeKey,
    name: &str,
    value: Option<&str>,
) -> Result<(), DomError> {
    let Some(value) = value else {
        doc.remove_attribute(node, name)?;
        match name {
            "checked" => doc.set_checked(node, false)?,
            "selected" => doc.element_mut(node)?.selected = false,
            _ => {}
        }
        return Ok(());
    };
    match name {
        "rr_width" | "rr_height" => {
            let Some(px) = parse_px(value) else {
                log::debug!(target: "replay.rebuild", "bad size {value:?} on {node}");
                return Ok(());
            };
            let mut rect = doc.element(node).map(|el| el.rect).unwrap_or_default();
            if name == "rr_width" {
                rect.width = px;
            } else {
                rect.height = px;
            }
            doc.set_rect(node, rect)
        }
        "rr_scrollLeft" | "rr_scrollTop" => {
            let offset: f64 = value.parse().unwrap_or(0.0);
            let mut scroll = doc.element(node).map(|el| el.scroll).unwrap_or_default();
            if name == "rr_scrollLeft" {
                scroll.left = offset;
            } else {
                scroll.top = offset;
            }
            doc.set_scroll(node, scroll)
        }
        "rr_dataURL" => {
            doc.element_mut(node)?.canvas_data = Some(value.to_string());
            Ok(())
        }
        "rr_src" => doc.set_attribute(node, "src", value),
        "value" => {
            doc.set_attribute(node, name, value)?;
            if is_form_control(doc, node) {
                doc.set_value(node, value)?;
            }
            Ok(())
        }
        "checked" => {
            doc.set_attribute(node, name, value)?;
            doc.set_checked(node, true)
        }
        "selected" => {
            doc.set_attribute(node, name, value)?;
            doc.element_mut(node)?.selected = true;
            Ok(())
        }
        _ => doc.set_attribute(node, name, value),
    }
}

pub(crate) fn is_form_control(doc: &Document, node: NodeKey) -> bool {
    matches!(doc.tag_name(node), Some("input" | "textarea" | "select"))
}

/// The element that holds the scroll offset for `node`: the document
/// element for documents, the node itself otherwise.
pub(crate) fn scroll_target(doc: &Document, node: NodeKey) -> Option<NodeKey> {
    match doc.kind(node)? {
        NodeKind::Document => doc
            .children(node)
            .iter()
            .copied()
            .find(|&c| doc.kind(c) == Some(NodeKind::Element)),
        NodeKind::Element => Some(node),
        _ => None,
    }
}
