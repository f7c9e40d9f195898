use std::fmt;

/// Handle to a node in a [`Document`](crate::Document) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) u32);

impl NodeKey {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    DocumentType,
    Element,
    ShadowRoot,
    Text,
    CData,
    Comment,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

/// Layout box of an element, as last reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollOffset {
    pub left: f64,
    pub top: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    Document {
        /// `None` means standards mode.
        compat_mode: Option<String>,
        /// The iframe element hosting this document, if any.
        frame: Option<NodeKey>,
    },
    DocumentType {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(ElementData),
    ShadowRoot {
        host: NodeKey,
    },
    Text(String),
    CData(String),
    Comment(String),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document { .. } => NodeKind::Document,
            NodeData::DocumentType { .. } => NodeKind::DocumentType,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::ShadowRoot { .. } => NodeKind::ShadowRoot,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::CData(_) => NodeKind::CData,
            NodeData::Comment(_) => NodeKind::Comment,
        }
    }

    pub(crate) fn is_container(&self) -> bool {
        matches!(
            self,
            NodeData::Document { .. } | NodeData::Element(_) | NodeData::ShadowRoot { .. }
        )
    }
}

/// Element state. Attributes change only through the owning document so that
/// every change is recorded; the remaining fields model host-side properties
/// that do not surface as mutation records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementData {
    pub(crate) tag_name: String,
    pub(crate) namespace: Namespace,
    pub(crate) attributes: Vec<(String, String)>,
    pub rect: Rect,
    pub scroll: ScrollOffset,
    /// Current form value, distinct from the `value` attribute.
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub selected: bool,
    /// Loaded stylesheet text for `<link rel=stylesheet>` and `<style>`.
    pub sheet: Option<String>,
    /// Encoded bitmap of a `<canvas>` element.
    pub canvas_data: Option<String>,
    pub(crate) content_document: Option<NodeKey>,
    pub(crate) loaded: bool,
    pub(crate) shadow_root: Option<NodeKey>,
}

impl ElementData {
    pub(crate) fn new(tag_name: &str, namespace: Namespace) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            namespace,
            ..Self::default()
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .unwrap_or("")
            .split_ascii_whitespace()
    }

    pub fn content_document(&self) -> Option<NodeKey> {
        self.content_document
    }

    pub fn shadow_root(&self) -> Option<NodeKey> {
        self.shadow_root
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
