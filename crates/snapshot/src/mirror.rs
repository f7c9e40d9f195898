//! Bidirectional id <-> node table.
//!
//! Invariants:
//! - `get_id(get_node(id)) == id` for every id currently mapped.
//! - A node with no metadata reports [`Id::UNKNOWN`].
//! - Sentinel ids are remembered in node metadata but never mapped back to a
//!   node, so `has(Id::IGNORED)` is always false.
//! - Removing a node from the map drops its id entry but keeps its metadata,
//!   so a detached node that comes back later is recognised as already seen.

use core_types::Id;
use dom::{Document, NodeKey};
use events::{NodeType, SerializedNode};
use std::collections::HashMap;

/// What the mirror remembers about a node besides its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeMeta {
    pub id: Id,
    pub node_type: NodeType,
    pub tag_name: Option<String>,
}

impl NodeMeta {
    pub fn new(id: Id, node_type: NodeType, tag_name: Option<&str>) -> Self {
        Self {
            id,
            node_type,
            tag_name: tag_name.map(str::to_string),
        }
    }
}

impl From<&SerializedNode> for NodeMeta {
    fn from(node: &SerializedNode) -> Self {
        Self::new(node.id, node.node_type(), node.tag_name())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mirror {
    id_node: HashMap<Id, NodeKey>,
    node_meta: HashMap<NodeKey, NodeMeta>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_id(&self, node: NodeKey) -> Id {
        self.node_meta.get(&node).map_or(Id::UNKNOWN, |meta| meta.id)
    }

    pub fn get_node(&self, id: Id) -> Option<NodeKey> {
        self.id_node.get(&id).copied()
    }

    pub fn get_meta(&self, node: NodeKey) -> Option<&NodeMeta> {
        self.node_meta.get(&node)
    }

    pub fn get_meta_by_id(&self, id: Id) -> Option<&NodeMeta> {
        self.get_node(id).and_then(|node| self.node_meta.get(&node))
    }

    pub fn has(&self, id: Id) -> bool {
        self.id_node.contains_key(&id)
    }

    /// True once the node has been through the serializer, even if it was
    /// ignored or has since been removed from the id table.
    pub fn has_node(&self, node: NodeKey) -> bool {
        self.node_meta.contains_key(&node)
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.id_node.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.id_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_node.is_empty()
    }

    pub fn add(&mut self, node: NodeKey, meta: NodeMeta) {
        if meta.id.is_assigned() {
            self.id_node.insert(meta.id, node);
        }
        self.node_meta.insert(node, meta);
    }

    /// Points `id` at `node`, carrying over the metadata of the node it
    /// previously pointed at.
    pub fn replace(&mut self, id: Id, node: NodeKey) {
        let meta = self
            .id_node
            .get(&id)
            .and_then(|old| self.node_meta.remove(old));
        if let Some(meta) = meta {
            self.node_meta.insert(node, meta);
        }
        if id.is_assigned() {
            self.id_node.insert(id, node);
        }
    }

    /// Drops the id entries of `node` and everything below it, shadow roots
    /// included. Children are read from `doc`, so call this before the
    /// subtree is taken apart.
    pub fn remove_node_from_map(&mut self, doc: &Document, node: NodeKey) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let id = self.get_id(current);
            if self.id_node.get(&id) == Some(&current) {
                self.id_node.remove(&id);
            }
            stack.extend_from_slice(doc.children(current));
            if let Some(shadow) = doc.shadow_root(current) {
                stack.extend_from_slice(doc.children(shadow));
            }
        }
    }

    pub fn reset(&mut self) {
        self.id_node.clear();
        self.node_meta.clear();
    }
}
