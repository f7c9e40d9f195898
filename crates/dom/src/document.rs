use crate::error::DomError;
use crate::mutation::MutationRecord;
use crate::types::{ElementData, Namespace, NodeData, NodeKey, NodeKind, Rect, ScrollOffset};

#[derive(Clone, Debug)]
struct NodeRecord {
    data: NodeData,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

/// Arena-backed document tree.
///
/// The arena may hold several roots: the main document, nested iframe
/// documents created with [`Document::create_document`], shadow roots and
/// any detached subtree. Only changes made while `observing` is set are
/// queued as mutation records.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<NodeRecord>,
    root: NodeKey,
    records: Vec<MutationRecord>,
    observing: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeKey(0),
            records: Vec::new(),
            observing: true,
        };
        doc.root = doc.push(NodeData::Document {
            compat_mode: None,
            frame: None,
        });
        doc
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn set_observing(&mut self, observing: bool) {
        self.observing = observing;
    }

    /// Drains every record queued since the last call.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    fn push(&mut self, data: NodeData) -> NodeKey {
        let key = NodeKey(self.nodes.len() as u32);
        self.nodes.push(NodeRecord {
            data,
            parent: None,
            children: Vec::new(),
        });
        key
    }

    fn record(&mut self, record: MutationRecord) {
        if self.observing {
            self.records.push(record);
        }
    }

    fn node(&self, key: NodeKey) -> Result<&NodeRecord, DomError> {
        self.nodes.get(key.index()).ok_or(DomError::UnknownNode(key))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut NodeRecord, DomError> {
        self.nodes
            .get_mut(key.index())
            .ok_or(DomError::UnknownNode(key))
    }

    // --- construction -----------------------------------------------------

    /// Creates a detached document node, used as the content of an iframe.
    pub fn create_document(&mut self) -> NodeKey {
        self.push(NodeData::Document {
            compat_mode: None,
            frame: None,
        })
    }

    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeKey {
        self.push(NodeData::DocumentType {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        })
    }

    pub fn create_element(&mut self, tag_name: &str) -> NodeKey {
        self.push(NodeData::Element(ElementData::new(tag_name, Namespace::Html)))
    }

    pub fn create_element_ns(&mut self, tag_name: &str, namespace: Namespace) -> NodeKey {
        self.push(NodeData::Element(ElementData::new(tag_name, namespace)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeKey {
        self.push(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeKey {
        self.push(NodeData::Comment(text.to_string()))
    }

    pub fn create_cdata(&mut self, text: &str) -> NodeKey {
        self.push(NodeData::CData(text.to_string()))
    }

    pub fn set_compat_mode(&mut self, document: NodeKey, mode: Option<String>) -> Result<(), DomError> {
        match &mut self.node_mut(document)?.data {
            NodeData::Document { compat_mode, .. } => {
                *compat_mode = mode;
                Ok(())
            }
            _ => Err(DomError::HierarchyRequest {
                parent: document,
                child: document,
            }),
        }
    }

    pub fn attach_shadow(&mut self, host: NodeKey) -> Result<NodeKey, DomError> {
        match self.element(host) {
            None => return Err(DomError::NotAnElement(host)),
            Some(el) if el.shadow_root.is_some() => return Err(DomError::ShadowRootExists(host)),
            Some(_) => {}
        }
        let shadow = self.push(NodeData::ShadowRoot { host });
        self.element_mut(host)?.shadow_root = Some(shadow);
        Ok(shadow)
    }

    /// Links `document` as the content of `frame`. The frame counts as loaded
    /// only after [`Document::mark_loaded`].
    pub fn set_content_document(&mut self, frame: NodeKey, document: NodeKey) -> Result<(), DomError> {
        match &mut self.node_mut(document)?.data {
            NodeData::Document { frame: owner, .. } => *owner = Some(frame),
            _ => {
                return Err(DomError::HierarchyRequest {
                    parent: frame,
                    child: document,
                });
            }
        }
        self.element_mut(frame)?.content_document = Some(document);
        Ok(())
    }

    pub fn mark_loaded(&mut self, element: NodeKey) -> Result<(), DomError> {
        self.element_mut(element)?.loaded = true;
        Ok(())
    }

    // --- tree edits -------------------------------------------------------

    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` under `parent` before `reference`, or last when
    /// `reference` is `None`. A child that already has a parent is moved, and
    /// the move is recorded as a removal followed by an insertion.
    pub fn insert_before(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        reference: Option<NodeKey>,
    ) -> Result<(), DomError> {
        self.check_insert(parent, child)?;
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
            if reference == child {
                return Ok(());
            }
        }

        if let Some(old_parent) = self.node(child)?.parent {
            self.detach(old_parent, child)?;
        }

        let index = match reference {
            Some(reference) => self
                .index_in_parent(parent, reference)
                .ok_or(DomError::NotAChild {
                    parent,
                    child: reference,
                })?,
            None => self.node(parent)?.children.len(),
        };
        let previous_sibling = index
            .checked_sub(1)
            .and_then(|i| self.nodes[parent.index()].children.get(i).copied());
        self.nodes[parent.index()].children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);

        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
            previous_sibling,
            next_sibling: reference,
        });
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(parent, child)
    }

    /// Detaches `node` from its parent, if it has one.
    pub fn remove(&mut self, node: NodeKey) -> Result<(), DomError> {
        match self.node(node)?.parent {
            Some(parent) => self.detach(parent, node),
            None => Ok(()),
        }
    }

    fn detach(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        let index = self
            .index_in_parent(parent, child)
            .ok_or(DomError::NotAChild { parent, child })?;
        let siblings = &mut self.nodes[parent.index()].children;
        let previous_sibling = index.checked_sub(1).map(|i| siblings[i]);
        let next_sibling = siblings.get(index + 1).copied();
        siblings.remove(index);
        self.nodes[child.index()].parent = None;
        self.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
            previous_sibling,
            next_sibling,
        });
        Ok(())
    }

    fn check_insert(&self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        if !self.node(parent)?.data.is_container() {
            return Err(DomError::NotAContainer(parent));
        }
        let child_kind = self.node(child)?.data.kind();
        if matches!(child_kind, NodeKind::Document | NodeKind::ShadowRoot) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        // Reject cycles: `child` must not be `parent` or one of its ancestors.
        let mut cursor = Some(parent);
        while let Some(key) = cursor {
            if key == child {
                return Err(DomError::HierarchyRequest { parent, child });
            }
            cursor = self.structural_parent(key);
        }
        Ok(())
    }

    fn index_in_parent(&self, parent: NodeKey, child: NodeKey) -> Option<usize> {
        self.nodes
            .get(parent.index())?
            .children
            .iter()
            .position(|&c| c == child)
    }

    // --- attributes and character data ----------------------------------

    pub fn set_attribute(&mut self, element: NodeKey, name: &str, value: &str) -> Result<(), DomError> {
        let el = self.element_mut(element)?;
        let old_value = match el.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => Some(std::mem::replace(v, value.to_string())),
            None => {
                el.attributes.push((name.to_string(), value.to_string()));
                None
            }
        };
        self.record(MutationRecord::Attributes {
            target: element,
            name: name.to_string(),
            old_value,
        });
        Ok(())
    }

    pub fn remove_attribute(&mut self, element: NodeKey, name: &str) -> Result<(), DomError> {
        let el = self.element_mut(element)?;
        let Some(index) = el.attributes.iter().position(|(k, _)| k == name) else {
            return Ok(());
        };
        let (_, old) = el.attributes.remove(index);
        self.record(MutationRecord::Attributes {
            target: element,
            name: name.to_string(),
            old_value: Some(old),
        });
        Ok(())
    }

    /// Replaces the character data of a text, comment or CDATA node.
    pub fn set_text(&mut self, node: NodeKey, text: &str) -> Result<(), DomError> {
        let old_value = match &mut self.node_mut(node)?.data {
            NodeData::Text(s) | NodeData::Comment(s) | NodeData::CData(s) => {
                std::mem::replace(s, text.to_string())
            }
            _ => return Err(DomError::NotCharacterData(node)),
        };
        self.record(MutationRecord::CharacterData {
            target: node,
            old_value,
        });
        Ok(())
    }

    // --- element state (not recorded) -----------------------------------

    pub fn element_mut(&mut self, key: NodeKey) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(key)?.data {
            NodeData::Element(el) => Ok(el),
            _ => Err(DomError::NotAnElement(key)),
        }
    }

    pub fn set_value(&mut self, element: NodeKey, value: &str) -> Result<(), DomError> {
        self.element_mut(element)?.value = Some(value.to_string());
        Ok(())
    }

    pub fn set_checked(&mut self, element: NodeKey, checked: bool) -> Result<(), DomError> {
        self.element_mut(element)?.checked = Some(checked);
        Ok(())
    }

    pub fn set_rect(&mut self, element: NodeKey, rect: Rect) -> Result<(), DomError> {
        self.element_mut(element)?.rect = rect;
        Ok(())
    }

    pub fn set_scroll(&mut self, element: NodeKey, scroll: ScrollOffset) -> Result<(), DomError> {
        self.element_mut(element)?.scroll = scroll;
        Ok(())
    }

    pub fn set_sheet(&mut self, element: NodeKey, css_text: &str) -> Result<(), DomError> {
        self.element_mut(element)?.sheet = Some(css_text.to_string());
        Ok(())
    }

    // --- queries ----------------------------------------------------------

    pub fn contains_key(&self, key: NodeKey) -> bool {
        key.index() < self.nodes.len()
    }

    pub fn data(&self, key: NodeKey) -> Option<&NodeData> {
        self.nodes.get(key.index()).map(|n| &n.data)
    }

    pub fn kind(&self, key: NodeKey) -> Option<NodeKind> {
        self.data(key).map(NodeData::kind)
    }

    pub fn element(&self, key: NodeKey) -> Option<&ElementData> {
        match self.data(key)? {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, key: NodeKey) -> Option<&str> {
        self.element(key).map(ElementData::tag_name)
    }

    pub fn attribute(&self, key: NodeKey, name: &str) -> Option<&str> {
        self.element(key)?.attribute(name)
    }

    /// Character data of a text, comment or CDATA node.
    pub fn text(&self, key: NodeKey) -> Option<&str> {
        match self.data(key)? {
            NodeData::Text(s) | NodeData::Comment(s) | NodeData::CData(s) => Some(s),
            _ => None,
        }
    }

    /// Concatenated text of `key` and its light-tree descendants.
    pub fn text_content(&self, key: NodeKey) -> String {
        if let Some(text) = self.text(key) {
            return text.to_string();
        }
        let mut out = String::new();
        for node in self.descendants(key) {
            if let Some(NodeData::Text(s) | NodeData::CData(s)) = self.data(node) {
                out.push_str(s);
            }
        }
        out
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key.index())?.parent
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(key.index())
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, key: NodeKey) -> Option<NodeKey> {
        self.children(key).first().copied()
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.index_in_parent(parent, key)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.index_in_parent(parent, key)?;
        self.children(parent).get(index.checked_sub(1)?).copied()
    }

    pub fn shadow_root(&self, host: NodeKey) -> Option<NodeKey> {
        self.element(host)?.shadow_root
    }

    /// The host element when `key` is a shadow root.
    pub fn shadow_host(&self, key: NodeKey) -> Option<NodeKey> {
        match self.data(key)? {
            NodeData::ShadowRoot { host } => Some(*host),
            _ => None,
        }
    }

    pub fn content_document(&self, frame: NodeKey) -> Option<NodeKey> {
        self.element(frame)?.content_document
    }

    /// The iframe element hosting `document`, if any.
    pub fn frame_element(&self, document: NodeKey) -> Option<NodeKey> {
        match self.data(document)? {
            NodeData::Document { frame, .. } => *frame,
            _ => None,
        }
    }

    /// Parent, or the host when `key` is a shadow root.
    fn structural_parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.parent(key).or_else(|| self.shadow_host(key))
    }

    /// Topmost node reached by walking parents, crossing shadow boundaries
    /// but not frame boundaries. For a connected node this is its owning
    /// document.
    pub fn owner_root(&self, key: NodeKey) -> NodeKey {
        let mut current = key;
        while let Some(next) = self.structural_parent(current) {
            current = next;
        }
        current
    }

    /// The document node `key` belongs to, if it is attached to one.
    pub fn owner_document(&self, key: NodeKey) -> Option<NodeKey> {
        let root = self.owner_root(key);
        (self.kind(root) == Some(NodeKind::Document)).then_some(root)
    }

    /// True when `key` is attached to the main document.
    pub fn is_connected(&self, key: NodeKey) -> bool {
        self.owner_root(key) == self.root
    }

    /// True when `ancestor` is `node` or one of its structural ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut cursor = Some(node);
        while let Some(key) = cursor {
            if key == ancestor {
                return true;
            }
            cursor = self.structural_parent(key);
        }
        false
    }

    /// Pre-order walk over the light-tree descendants of `key`, excluding
    /// `key` itself.
    pub fn descendants(&self, key: NodeKey) -> Descendants<'_> {
        let mut stack: Vec<NodeKey> = self.children(key).iter().rev().copied().collect();
        stack.shrink_to_fit();
        Descendants { doc: self, stack }
    }
}

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeKey>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let key = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(key).iter().rev().copied());
        Some(key)
    }
}
