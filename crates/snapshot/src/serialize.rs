//! Live tree to [`SerializedNode`].
//!
//! The walk is depth-first, pre-order. A node keeps the id the mirror already
//! holds for it; otherwise it gets the next id from the session generator,
//! or the ignored sentinel when the slim-DOM rules or whitespace policy drop
//! it. Ignored nodes are remembered in the mirror but produce no output and
//! their children are not visited.
//!
//! Light children come first, then shadow-root children flagged `isShadow`.
//! Iframe documents and unloaded stylesheets are not serialized inline: they
//! are registered with [`PendingLoads`] and handed to the observer once
//! [`SerializeContext::resolve_pending`] sees them loaded.

use crate::attributes::transform_attribute;
use crate::masking::{is_blocked, mask_input_value, mask_text, needs_masking_text};
use crate::mirror::{Mirror, NodeMeta};
use crate::options::SerializeOptions;
use crate::pending::{LoadKind, PendingLoads};
use core_types::{Id, IdGenerator};
use css::absolute_to_stylesheet;
use dom::{Document, ElementData, Namespace, NodeData, NodeKey};
use events::{Attributes, SerializedData, SerializedNode};
use std::time::Duration;

/// Stands in for script source, which is never recorded.
pub const SCRIPT_PLACEHOLDER: &str = "SCRIPT_PLACEHOLDER";

/// Hooks called while serializing. All methods default to no-ops.
pub trait SerializeObserver {
    /// Called once per node that received a real id.
    fn on_serialize(&mut self, _node: NodeKey) {}

    /// The content document of `frame` finished loading and was serialized.
    fn on_iframe_load(&mut self, _frame: NodeKey, _document: SerializedNode) {}

    /// The sheet of `link` finished loading; `link_node` carries its inlined
    /// attributes.
    fn on_stylesheet_load(&mut self, _link: NodeKey, _link_node: SerializedNode) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeFlags {
    /// Serialize only the node itself.
    pub skip_child: bool,
    /// The node was just inserted; its scroll position is not meaningful.
    pub newly_added: bool,
    pub preserve_white_space: bool,
}

impl SerializeFlags {
    pub fn full_tree(options: &SerializeOptions) -> Self {
        Self {
            skip_child: false,
            newly_added: false,
            preserve_white_space: options.preserve_white_space,
        }
    }

    pub fn added_node(options: &SerializeOptions) -> Self {
        Self {
            skip_child: true,
            newly_added: true,
            preserve_white_space: options.preserve_white_space,
        }
    }
}

pub struct SerializeContext<'a> {
    pub doc: &'a Document,
    pub mirror: &'a mut Mirror,
    pub ids: &'a mut IdGenerator,
    pub options: &'a SerializeOptions,
    pub pending: Option<&'a mut PendingLoads>,
    pub observer: Option<&'a mut dyn SerializeObserver>,
    /// Time async loads are registered at.
    pub now: Duration,
}

impl<'a> SerializeContext<'a> {
    pub fn new(
        doc: &'a Document,
        mirror: &'a mut Mirror,
        ids: &'a mut IdGenerator,
        options: &'a SerializeOptions,
    ) -> Self {
        Self {
            doc,
            mirror,
            ids,
            options,
            pending: None,
            observer: None,
            now: Duration::ZERO,
        }
    }

    pub fn with_pending(mut self, pending: &'a mut PendingLoads, now: Duration) -> Self {
        self.pending = Some(pending);
        self.now = now;
        self
    }

    pub fn with_observer(mut self, observer: &'a mut dyn SerializeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Serialized payload of `node` alone, without an id. `None` for node
    /// kinds that have no serialized form (shadow roots).
    pub fn serialize_node(&self, node: NodeKey, newly_added: bool) -> Option<SerializedData> {
        match self.doc.data(node)? {
            NodeData::Document { compat_mode, .. } => Some(SerializedData::Document {
                compat_mode: compat_mode.clone().filter(|mode| mode != "CSS1Compat"),
            }),
            NodeData::DocumentType {
                name,
                public_id,
                system_id,
            } => Some(SerializedData::DocumentType {
                name: name.clone(),
                public_id: public_id.clone(),
                system_id: system_id.clone(),
            }),
            NodeData::Element(el) => Some(self.serialize_element(node, el, newly_added)),
            NodeData::Text(text) => Some(self.serialize_text(node, text)),
            NodeData::CData(text) => Some(SerializedData::CData {
                text_content: text.clone(),
            }),
            NodeData::Comment(text) => Some(SerializedData::Comment {
                text_content: text.clone(),
            }),
            NodeData::ShadowRoot { .. } => None,
        }
    }

    fn stylesheet_text(&self, css_text: &str) -> String {
        match &self.options.base_url {
            Some(base) => absolute_to_stylesheet(css_text, base.as_str()),
            None => css_text.to_string(),
        }
    }

    fn serialize_element(&self, node: NodeKey, el: &ElementData, newly_added: bool) -> SerializedData {
        let options = self.options;
        let tag = el.tag_name();
        let need_block = is_blocked(self.doc, node, options, false);
        let mut attributes: Attributes = el
            .attributes()
            .iter()
            .map(|(name, value)| {
                let value = transform_attribute(options.base_url.as_ref(), tag, name, value);
                (name.clone(), value)
            })
            .collect();

        if tag == "link" && options.inline_stylesheet {
            if let Some(css_text) = el.sheet.as_deref().filter(|s| !s.is_empty()) {
                let href = attributes.remove("href").unwrap_or_default();
                attributes.remove("rel");
                attributes.insert("_cssText".into(), absolute_to_stylesheet(css_text, &href));
            }
        }

        if tag == "style" && self.doc.text_content(node).trim().is_empty() {
            if let Some(css_text) = el.sheet.as_deref().filter(|s| !s.is_empty()) {
                attributes.insert("_cssText".into(), self.stylesheet_text(css_text));
            }
        }

        if matches!(tag, "input" | "textarea" | "select") {
            let input_type = attributes.get("type").cloned();
            let value = el.value.clone().or_else(|| match tag {
                "textarea" => Some(self.doc.text_content(node)),
                _ => el.attribute("value").map(str::to_string),
            });
            let checked = el
                .checked
                .unwrap_or_else(|| el.attribute("checked").is_some());
            let toggle = matches!(
                input_type.as_deref(),
                Some("radio" | "checkbox" | "submit" | "button")
            );
            match value.filter(|v| !v.is_empty()) {
                Some(value) if !toggle => {
                    let masked = mask_input_value(tag, input_type.as_deref(), &value, options);
                    attributes.insert("value".into(), masked);
                }
                _ => {
                    if checked {
                        attributes.insert("checked".into(), String::new());
                    }
                }
            }
        }

        if tag == "option" {
            let selected = el.selected || el.attribute("selected").is_some();
            if selected && !options.masks_input("select", None) {
                attributes.insert("selected".into(), String::new());
            } else {
                attributes.remove("selected");
            }
        }

        if tag == "canvas" && options.record_canvas {
            if let Some(data_url) = el.canvas_data.as_deref().filter(|d| !d.is_empty()) {
                attributes.insert("rr_dataURL".into(), data_url.to_string());
            }
        }

        if !newly_added {
            if el.scroll.left != 0.0 {
                attributes.insert("rr_scrollLeft".into(), el.scroll.left.to_string());
            }
            if el.scroll.top != 0.0 {
                attributes.insert("rr_scrollTop".into(), el.scroll.top.to_string());
            }
        }

        if need_block {
            let mut placeholder = Attributes::new();
            if let Some(class) = attributes.remove("class") {
                placeholder.insert("class".into(), class);
            }
            placeholder.insert("rr_width".into(), format!("{}px", el.rect.width));
            placeholder.insert("rr_height".into(), format!("{}px", el.rect.height));
            attributes = placeholder;
        }

        if tag == "iframe" {
            let src = attributes.get("src").cloned();
            if !src.as_deref().is_some_and(|s| options.keeps_iframe_src(s)) {
                attributes.remove("src");
                if let (None, Some(src)) = (el.content_document(), src) {
                    attributes.insert("rr_src".into(), src);
                }
            }
        }

        SerializedData::Element {
            tag_name: tag.to_string(),
            attributes,
            is_svg: el.namespace() == Namespace::Svg || tag == "svg",
            need_block,
            is_shadow_host: el.shadow_root().is_some(),
        }
    }

    fn serialize_text(&self, node: NodeKey, text: &str) -> SerializedData {
        let doc = self.doc;
        let parent = doc.parent(node);
        let parent_el = parent.and_then(|p| doc.element(p));
        let parent_tag = parent_el.map(ElementData::tag_name);
        let is_style = parent_tag == Some("style");

        let text_content = if is_style {
            if text.is_empty() {
                String::new()
            } else {
                let sole_child = parent.is_some_and(|p| doc.children(p).len() == 1);
                let sheet = parent_el.and_then(|el| el.sheet.as_deref());
                match sheet {
                    Some(sheet) if sole_child && !sheet.is_empty() => self.stylesheet_text(sheet),
                    _ => self.stylesheet_text(text),
                }
            }
        } else if parent_tag == Some("script") {
            SCRIPT_PLACEHOLDER.to_string()
        } else if parent_tag == Some("textarea") && self.options.masks_input("textarea", None) {
            mask_input_value("textarea", None, text, self.options)
        } else if !text.is_empty() && needs_masking_text(doc, node, self.options) {
            mask_text(text, self.options)
        } else {
            text.to_string()
        };

        SerializedData::Text {
            text_content,
            is_style,
        }
    }

    /// Id of the nested document `node` lives in, when that is not the main
    /// document.
    fn root_id(&self, node: NodeKey) -> Option<Id> {
        let owner = self.doc.owner_document(node)?;
        if owner == self.doc.root() {
            return None;
        }
        let id = self.mirror.get_id(owner);
        id.is_assigned().then_some(id)
    }

    /// Serializes `node` and, unless `flags.skip_child`, its subtree.
    /// Returns `None` when the node is ignored or cannot be represented.
    pub fn serialize_node_with_id(&mut self, node: NodeKey, flags: SerializeFlags) -> Option<SerializedNode> {
        let doc = self.doc;
        let Some(data) = self.serialize_node(node, flags.newly_added) else {
            log::warn!(target: "snapshot.serialize", "{node} has no serialized form, leaving it out");
            return None;
        };

        let id = if self.mirror.has_node(node) {
            self.mirror.get_id(node)
        } else if self.options.slim_dom.excludes(&data)
            || (!flags.preserve_white_space && is_blank_text(&data))
        {
            Id::IGNORED
        } else {
            self.ids.next_id()
        };
        self.mirror
            .add(node, NodeMeta::new(id, data.node_type(), data.tag_name()));
        if !id.is_assigned() {
            return None;
        }
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_serialize(node);
        }

        let mut serialized = SerializedNode::new(id, data);
        if !matches!(serialized.data, SerializedData::Document { .. }) {
            serialized.root_id = self.root_id(node);
        }

        let record_children = !flags.skip_child
            && match &serialized.data {
                SerializedData::Document { .. } => true,
                SerializedData::Element { need_block, .. } => !need_block,
                _ => false,
            };
        if record_children {
            let mut child_flags = SerializeFlags {
                newly_added: false,
                ..flags
            };
            if self.options.slim_dom.head_whitespace && serialized.tag_name() == Some("head") {
                child_flags.preserve_white_space = false;
            }
            for &child in doc.children(node) {
                if let Some(child) = self.serialize_node_with_id(child, child_flags) {
                    serialized.child_nodes.push(child);
                }
            }
            if let Some(shadow) = doc.shadow_root(node) {
                for &child in doc.children(shadow) {
                    if let Some(mut child) = self.serialize_node_with_id(child, child_flags) {
                        child.is_shadow = true;
                        serialized.child_nodes.push(child);
                    }
                }
            }
        }

        if doc.parent(node).and_then(|p| doc.shadow_host(p)).is_some() {
            serialized.is_shadow = true;
        }

        if let SerializedData::Element {
            tag_name,
            attributes,
            need_block: false,
            ..
        } = &serialized.data
        {
            let wait = match tag_name.as_str() {
                "iframe" => Some((LoadKind::Iframe, self.options.iframe_load_timeout)),
                "link" if attributes.get("rel").map(String::as_str) == Some("stylesheet") => {
                    Some((LoadKind::Stylesheet, self.options.stylesheet_load_timeout))
                }
                _ => None,
            };
            if let (Some((kind, timeout)), Some(pending)) = (wait, self.pending.as_deref_mut()) {
                pending.register(node, kind, self.now + timeout);
            }
        }

        Some(serialized)
    }

    /// Serializes every pending iframe document and stylesheet link that has
    /// loaded since it was registered, reporting each to the observer.
    /// Returns how many resolved.
    pub fn resolve_pending(&mut self) -> usize {
        let doc = self.doc;
        let now = self.now;
        let Some(pending) = self.pending.as_deref_mut() else {
            return 0;
        };
        let ready = pending.take_ready(doc, now);
        let flags = SerializeFlags::full_tree(self.options);
        let mut resolved = 0;
        for (node, kind) in ready {
            match kind {
                LoadKind::Iframe => {
                    let Some(content) = doc.content_document(node) else {
                        continue;
                    };
                    if let Some(document) = self.serialize_node_with_id(content, flags) {
                        resolved += 1;
                        if let Some(observer) = self.observer.as_deref_mut() {
                            observer.on_iframe_load(node, document);
                        }
                    }
                }
                LoadKind::Stylesheet => {
                    if let Some(link_node) = self.serialize_node_with_id(node, flags) {
                        resolved += 1;
                        if let Some(observer) = self.observer.as_deref_mut() {
                            observer.on_stylesheet_load(node, link_node);
                        }
                    }
                }
            }
        }
        resolved
    }
}

fn is_blank_text(data: &SerializedData) -> bool {
    matches!(
        data,
        SerializedData::Text { text_content, is_style: false } if text_content.trim().is_empty()
    )
}

/// Serializes the whole document into a fresh tree, registering every node
/// in `mirror`.
pub fn snapshot(
    doc: &Document,
    mirror: &mut Mirror,
    ids: &mut IdGenerator,
    options: &SerializeOptions,
) -> Option<SerializedNode> {
    let flags = SerializeFlags::full_tree(options);
    SerializeContext::new(doc, mirror, ids, options).serialize_node_with_id(doc.root(), flags)
}
