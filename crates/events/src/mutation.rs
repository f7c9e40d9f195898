//! Incremental tree changes.
//!
//! Protocol invariants a consumer can rely on:
//! - Within one [`MutationData`], `removes` apply before `adds`, then
//!   `texts`, then `attributes`.
//! - An add whose `parent_id` is not yet known may be deferred; adds are
//!   ordered so that applying them front to back with deferral terminates.
//! - `next_id: None` means the node is the last child of its parent.
//! - An `AttributeChange::Value(None)` removes the attribute.
use crate::node::SerializedNode;
use core_types::Id;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationData {
    #[serde(default)]
    pub texts: Vec<TextMutation>,
    #[serde(default)]
    pub attributes: Vec<AttributeMutation>,
    #[serde(default)]
    pub removes: Vec<RemovedNode>,
    #[serde(default)]
    pub adds: Vec<AddedNode>,
    /// Set when the payload attaches a newly loaded frame document.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_attach_iframe: bool,
}

impl MutationData {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
            && self.attributes.is_empty()
            && self.removes.is_empty()
            && self.adds.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMutation {
    pub id: Id,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMutation {
    pub id: Id,
    pub attributes: BTreeMap<String, AttributeChange>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedNode {
    pub parent_id: Id,
    pub id: Id,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_shadow: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedNode {
    pub parent_id: Id,
    pub next_id: Option<Id>,
    pub node: SerializedNode,
}

/// New value of one attribute. `style` carries a per-property diff instead
/// of the full text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeChange {
    Value(Option<String>),
    Style(BTreeMap<String, StyleChange>),
}

/// One property inside a `style` attribute diff.
///
/// On the wire: `false` for removed, `"value"` for set without priority,
/// `["value", "important"]` for set with priority and `null` for unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StyleChange {
    Unchanged,
    Removed,
    Set {
        value: String,
        priority: Option<String>,
    },
}

impl Serialize for StyleChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StyleChange::Unchanged => serializer.serialize_none(),
            StyleChange::Removed => serializer.serialize_bool(false),
            StyleChange::Set {
                value,
                priority: None,
            } => serializer.serialize_str(value),
            StyleChange::Set {
                value,
                priority: Some(priority),
            } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(value)?;
                seq.serialize_element(priority)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for StyleChange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StyleChangeVisitor;

        impl<'de> Visitor<'de> for StyleChangeVisitor {
            type Value = StyleChange;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("false, null, a string or a [value, priority] pair")
            }

            fn visit_unit<E: de::Error>(self) -> Result<StyleChange, E> {
                Ok(StyleChange::Unchanged)
            }

            fn visit_none<E: de::Error>(self) -> Result<StyleChange, E> {
                Ok(StyleChange::Unchanged)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<StyleChange, E> {
                if v {
                    Err(E::invalid_value(de::Unexpected::Bool(true), &self))
                } else {
                    Ok(StyleChange::Removed)
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<StyleChange, E> {
                Ok(StyleChange::Set {
                    value: v.to_string(),
                    priority: None,
                })
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StyleChange, A::Error> {
                let value: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let priority: Option<String> = seq.next_element()?;
                Ok(StyleChange::Set {
                    value,
                    priority: priority.filter(|p| !p.is_empty()),
                })
            }
        }

        deserializer.deserialize_any(StyleChangeVisitor)
    }
}
