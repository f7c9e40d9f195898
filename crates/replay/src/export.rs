//! Serializes a replayed tree back into snapshot form.
//!
//! Unlike the capture-side serializer this applies no policy: attributes and
//! text are copied as they are, ids come straight from the mirror, and nodes
//! the mirror does not know are left out. Host state that has no attribute
//! form travels as the same `rr_*` attributes the capture side uses, and a
//! frame's loaded document is emitted as the frame's last child.

use dom::{Document, NodeData, NodeKey};
use events::{Attributes, SerializedData, SerializedNode};
use snapshot::Mirror;

pub fn export(doc: &Document, mirror: &Mirror, node: NodeKey) -> Option<SerializedNode> {
    let id = mirror.get_id(node);
    if !id.is_assigned() {
        return None;
    }
    let data = match doc.data(node)? {
        NodeData::Document { compat_mode, .. } => SerializedData::Document {
            compat_mode: compat_mode.clone(),
        },
        NodeData::DocumentType {
            name,
            public_id,
            system_id,
        } => SerializedData::DocumentType {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Element(el) => {
            let mut attributes: Attributes = el.attributes().iter().cloned().collect();
            if el.rect.width != 0.0 || el.rect.height != 0.0 {
                attributes.insert("rr_width".into(), format!("{}px", el.rect.width));
                attributes.insert("rr_height".into(), format!("{}px", el.rect.height));
            }
            if el.scroll.left != 0.0 {
                attributes.insert("rr_scrollLeft".into(), el.scroll.left.to_string());
            }
            if el.scroll.top != 0.0 {
                attributes.insert("rr_scrollTop".into(), el.scroll.top.to_string());
            }
            if let Some(data_url) = &el.canvas_data {
                attributes.insert("rr_dataURL".into(), data_url.clone());
            }
            SerializedData::Element {
                tag_name: el.tag_name().to_string(),
                attributes,
                is_svg: el.namespace() == dom::Namespace::Svg,
                need_block: false,
                is_shadow_host: el.shadow_root().is_some(),
            }
        }
        NodeData::Text(text) => SerializedData::Text {
            text_content: text.clone(),
            is_style: doc.parent(node).and_then(|p| doc.tag_name(p)) == Some("style"),
        },
        NodeData::CData(text) => SerializedData::CData {
            text_content: text.clone(),
        },
        NodeData::Comment(text) => SerializedData::Comment {
            text_content: text.clone(),
        },
        NodeData::ShadowRoot { .. } => return None,
    };

    let mut serialized = SerializedNode::new(id, data);
    for &child in doc.children(node) {
        serialized.child_nodes.extend(export(doc, mirror, child));
    }
    if let Some(shadow) = doc.shadow_root(node) {
        for &child in doc.children(shadow) {
            if let Some(mut child) = export(doc, mirror, child) {
                child.is_shadow = true;
                serialized.child_nodes.push(child);
            }
        }
    }
    if let Some(content) = doc.content_document(node) {
        serialized.child_nodes.extend(export(doc, mirror, content));
    }
    Some(serialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebuild::rebuild;

    #[test]
    fn export_of_a_rebuild_is_identical() {
        let json = r#"{
            "id": 1, "type": 0,
            "childNodes": [
                {"id": 2, "type": 2, "tagName": "div", "attributes": {"class": "a", "rr_scrollTop": "40"},
                 "childNodes": [
                    {"id": 3, "type": 3, "textContent": "hi"},
                    {"id": 4, "type": 5, "textContent": "note"}
                 ]}
            ]
        }"#;
        let original: SerializedNode = serde_json::from_str(json).unwrap();
        let (doc, mirror) = rebuild(&original).unwrap();
        assert_eq!(export(&doc, &mirror, doc.root()), Some(original));
    }

    #[test]
    fn unmapped_nodes_are_left_out() {
        let mut doc = Document::new();
        let mut mirror = Mirror::new();
        let root = doc.root();
        mirror.add(
            root,
            snapshot::NodeMeta::new(core_types::Id::from_raw(1), events::NodeType::Document, None),
        );
        let stray = doc.create_element("div");
        doc.append_child(root, stray).unwrap();
        let exported = export(&doc, &mirror, root).unwrap();
        assert!(exported.child_nodes.is_empty());
    }
}
