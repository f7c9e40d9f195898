use core_types::Id;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute name to value. Boolean attributes carry an empty string; a few
/// synthetic `rr_*` and `_cssText` entries transport host state.
pub type Attributes = BTreeMap<String, String>;

/// Plain node-type discriminant, kept alongside ids in the mirror. Written
/// as the node's numeric `type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Document,
    DocumentType,
    Element,
    Text,
    CData,
    Comment,
}

numeric_enum!(NodeType {
    Document = 0,
    DocumentType = 1,
    Element = 2,
    Text = 3,
    CData = 4,
    Comment = 5,
});

fn is_false(b: &bool) -> bool {
    !*b
}

/// Type-specific payload of a [`SerializedNode`], flattened into it next to
/// the numeric `type`.
#[derive(Clone, Debug, PartialEq)]
pub enum SerializedData {
    Document {
        compat_mode: Option<String>,
    },
    DocumentType {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element {
        tag_name: String,
        attributes: Attributes,
        is_svg: bool,
        need_block: bool,
        is_shadow_host: bool,
    },
    Text {
        text_content: String,
        is_style: bool,
    },
    CData {
        text_content: String,
    },
    Comment {
        text_content: String,
    },
}

impl Serialize for SerializedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.node_type())?;
        match self {
            SerializedData::Document { compat_mode } => {
                if let Some(mode) = compat_mode {
                    map.serialize_entry("compatMode", mode)?;
                }
            }
            SerializedData::DocumentType {
                name,
                public_id,
                system_id,
            } => {
                map.serialize_entry("name", name)?;
                map.serialize_entry("publicId", public_id)?;
                map.serialize_entry("systemId", system_id)?;
            }
            SerializedData::Element {
                tag_name,
                attributes,
                is_svg,
                need_block,
                is_shadow_host,
            } => {
                map.serialize_entry("tagName", tag_name)?;
                map.serialize_entry("attributes", attributes)?;
                for (key, set) in [("isSVG", is_svg), ("needBlock", need_block), ("isShadowHost", is_shadow_host)] {
                    if *set {
                        map.serialize_entry(key, &true)?;
                    }
                }
            }
            SerializedData::Text { text_content, is_style } => {
                map.serialize_entry("textContent", text_content)?;
                if *is_style {
                    map.serialize_entry("isStyle", &true)?;
                }
            }
            SerializedData::CData { text_content } | SerializedData::Comment { text_content } => {
                map.serialize_entry("textContent", text_content)?;
            }
        }
        map.end()
    }
}

/// Every field any node type may carry.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeFields {
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default)]
    compat_mode: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    public_id: String,
    #[serde(default)]
    system_id: String,
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default, deserialize_with = "attribute_values")]
    attributes: Attributes,
    #[serde(default, rename = "isSVG")]
    is_svg: bool,
    #[serde(default)]
    need_block: bool,
    #[serde(default)]
    is_shadow_host: bool,
    #[serde(default)]
    text_content: Option<String>,
    #[serde(default)]
    is_style: bool,
}

impl<'de> Deserialize<'de> for SerializedData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = NodeFields::deserialize(deserializer)?;
        let text = |content: Option<String>| {
            content.ok_or_else(|| <D::Error as de::Error>::missing_field("textContent"))
        };
        Ok(match fields.node_type {
            NodeType::Document => SerializedData::Document {
                compat_mode: fields.compat_mode,
            },
            NodeType::DocumentType => SerializedData::DocumentType {
                name: fields.name,
                public_id: fields.public_id,
                system_id: fields.system_id,
            },
            NodeType::Element => SerializedData::Element {
                tag_name: fields
                    .tag_name
                    .ok_or_else(|| <D::Error as de::Error>::missing_field("tagName"))?,
                attributes: fields.attributes,
                is_svg: fields.is_svg,
                need_block: fields.need_block,
                is_shadow_host: fields.is_shadow_host,
            },
            NodeType::Text => SerializedData::Text {
                text_content: text(fields.text_content)?,
                is_style: fields.is_style,
            },
            NodeType::CData => SerializedData::CData {
                text_content: text(fields.text_content)?,
            },
            NodeType::Comment => SerializedData::Comment {
                text_content: text(fields.text_content)?,
            },
        })
    }
}

/// Attribute values as strings: `true` marks a present boolean attribute,
/// numbers are written out, and `false` or `null` leave the attribute out.
fn attribute_values<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Attributes, D::Error> {
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::String(value) => value,
                Value::Bool(true) => String::new(),
                Value::Number(number) => number.to_string(),
                _ => return None,
            };
            Some((name, value))
        })
        .collect())
}

impl SerializedData {
    pub fn node_type(&self) -> NodeType {
        match self {
            SerializedData::Document { .. } => NodeType::Document,
            SerializedData::DocumentType { .. } => NodeType::DocumentType,
            SerializedData::Element { .. } => NodeType::Element,
            SerializedData::Text { .. } => NodeType::Text,
            SerializedData::CData { .. } => NodeType::CData,
            SerializedData::Comment { .. } => NodeType::Comment,
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        match self {
            SerializedData::Element { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }
}

/// Transport form of one node and, for containers, its children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub id: Id,
    #[serde(flatten)]
    pub data: SerializedData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_nodes: Vec<SerializedNode>,
    /// Id of the owning document when it is not the main one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<Id>,
    /// The node is a direct child of its parent's shadow root.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_shadow: bool,
}

impl SerializedNode {
    pub fn new(id: Id, data: SerializedData) -> Self {
        Self {
            id,
            data,
            child_nodes: Vec::new(),
            root_id: None,
            is_shadow: false,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.data.tag_name()
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match &self.data {
            SerializedData::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Pre-order visit of this node and every descendant.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SerializedNode)) {
        visit(self);
        for child in &self.child_nodes {
            child.walk(visit);
        }
    }

    /// Pre-order mutable visit, used to rewrite ids in place.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut SerializedNode)) {
        visit(self);
        for child in &mut self.child_nodes {
            child.walk_mut(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn element_serializes_flat_with_type_tag() {
        let mut attributes = Attributes::new();
        attributes.insert("class".into(), "a".into());
        let mut node = SerializedNode::new(
            Id::from_raw(3),
            SerializedData::Element {
                tag_name: "div".into(),
                attributes,
                is_svg: false,
                need_block: false,
                is_shadow_host: false,
            },
        );
        node.child_nodes.push(SerializedNode::new(
            Id::from_raw(4),
            SerializedData::Text {
                text_content: "hi".into(),
                is_style: false,
            },
        ));

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "type": 2,
                "tagName": "div",
                "attributes": {"class": "a"},
                "childNodes": [{"id": 4, "type": 3, "textContent": "hi"}]
            })
        );
        let back: SerializedNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn walk_visits_in_pre_order() {
        let json = json!({
            "id": 1, "type": 0,
            "childNodes": [
                {"id": 2, "type": 2, "tagName": "html", "attributes": {},
                 "childNodes": [{"id": 3, "type": 5, "textContent": "c"}]},
                {"id": 4, "type": 3, "textContent": "t", "isShadow": true}
            ]
        });
        let node: SerializedNode = serde_json::from_value(json).unwrap();
        let mut ids = Vec::new();
        node.walk(&mut |n| ids.push(n.id.as_raw()));
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(node.child_nodes[1].is_shadow);
    }

    #[test]
    fn foreign_attribute_values_are_read_as_strings() {
        let node: SerializedNode = serde_json::from_value(json!({
            "id": 7, "type": 2, "tagName": "svg", "isSVG": true,
            "attributes": {"hidden": true, "rr_scrollTop": 40, "open": false, "title": null, "class": "icon"}
        }))
        .unwrap();
        let attributes = node.attributes().unwrap();
        assert_eq!(attributes.get("hidden").map(String::as_str), Some(""));
        assert_eq!(attributes.get("rr_scrollTop").map(String::as_str), Some("40"));
        assert!(!attributes.contains_key("open"));
        assert!(!attributes.contains_key("title"));
        assert!(matches!(node.data, SerializedData::Element { is_svg: true, .. }));
        assert_eq!(serde_json::to_value(&node).unwrap()["isSVG"], json!(true));
    }

    #[test]
    fn unknown_node_type_codes_are_rejected() {
        assert!(serde_json::from_value::<SerializedNode>(json!({"id": 1, "type": 9})).is_err());
        assert!(serde_json::from_value::<SerializedNode>(json!({"id": 1, "type": "Document"})).is_err());
        assert!(serde_json::from_value::<SerializedNode>(json!({"id": 1, "type": 3})).is_err());
    }
}
