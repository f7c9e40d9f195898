//! Capture-side diffing.
//!
//! A [`MutationBuffer`] observes one document (the main one or a frame
//! document) and folds every [`MutationRecord`] of a batch into at most one
//! [`MutationData`]:
//!
//! - text and attribute changes are compared against the value the node had
//!   when the batch started, so a change reverted inside the batch leaves
//!   nothing behind;
//! - structural changes sort nodes into `added` (never serialized), `moved`
//!   (already known) and `dropped` (added and removed again);
//! - at emit time every add is placed by its live parent and next sibling;
//!   adds whose references are not known yet wait in a retry queue.
//!
//! Removed nodes leave the mirror lazily, at the start of the next emit, so
//! that "was an ancestor removed" questions can still be answered while the
//! batch is being classified.

use core_types::Id;
use css::parse_declarations;
use dom::{Document, MutationRecord, NodeKey, NodeKind};
use events::{
    AddedNode, AttributeChange, AttributeMutation, MutationData, RemovedNode, StyleChange,
    TextMutation,
};
use snapshot::attributes::transform_attribute;
use snapshot::{
    Mirror, SerializeContext, SerializeFlags, SerializeOptions, is_blocked, mask_input_value,
    mask_text, needs_masking_text,
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Insertion-ordered set of nodes.
#[derive(Debug, Default)]
struct NodeSet {
    order: Vec<NodeKey>,
    members: HashSet<NodeKey>,
}

impl NodeSet {
    fn insert(&mut self, node: NodeKey) {
        if self.members.insert(node) {
            self.order.push(node);
        }
    }

    fn remove(&mut self, node: NodeKey) {
        if self.members.remove(&node) {
            self.order.retain(|&n| n != node);
        }
    }

    fn contains(&self, node: NodeKey) -> bool {
        self.members.contains(&node)
    }

    fn to_vec(&self) -> Vec<NodeKey> {
        self.order.clone()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

#[derive(Debug)]
struct PendingAttributes {
    node: NodeKey,
    names: Vec<String>,
    /// Value of each attribute before the batch touched it.
    originals: HashMap<String, Option<String>>,
}

/// Adds waiting for their parent or next sibling to get an id.
///
/// A node is kept next to a queued sibling when it has one, otherwise at the
/// front. Draining starts from the back: newly appended siblings usually
/// resolve before their elder siblings.
#[derive(Debug, Default)]
struct RetryQueue {
    nodes: Vec<NodeKey>,
}

impl RetryQueue {
    fn position(&self, node: NodeKey) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }

    fn push(&mut self, doc: &Document, node: NodeKey) {
        if self.position(node).is_some() {
            return;
        }
        let after_previous = doc
            .previous_sibling(node)
            .and_then(|prev| self.position(prev))
            .map(|i| i + 1);
        let before_next = || doc.next_sibling(node).and_then(|next| self.position(next));
        let index = after_previous.or_else(before_next).unwrap_or(0);
        self.nodes.insert(index, node);
    }
}

#[derive(Debug)]
pub struct MutationBuffer {
    root: NodeKey,
    frozen: bool,
    locked: bool,
    texts: Vec<NodeKey>,
    text_originals: HashMap<NodeKey, String>,
    attributes: Vec<PendingAttributes>,
    removes: Vec<RemovedNode>,
    map_removes: Vec<NodeKey>,
    /// `(node id, parent id)` of moved nodes, to recognize a move that is
    /// undone by a removal from the same parent.
    moved_map: HashSet<(Id, Id)>,
    added: NodeSet,
    moved: NodeSet,
    dropped: NodeSet,
}

impl MutationBuffer {
    /// A buffer for the document rooted at `root`.
    pub fn new(root: NodeKey) -> Self {
        Self {
            root,
            frozen: false,
            locked: false,
            texts: Vec::new(),
            text_originals: HashMap::new(),
            attributes: Vec::new(),
            removes: Vec::new(),
            map_removes: Vec::new(),
            moved_map: HashSet::new(),
            added: NodeSet::default(),
            moved: NodeSet::default(),
            dropped: NodeSet::default(),
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Keeps buffering but stops emitting, e.g. while the page is hidden.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Resumes emitting and flushes whatever accumulated.
    pub fn unfreeze(&mut self, ctx: &mut SerializeContext<'_>) -> Option<MutationData> {
        self.frozen = false;
        self.emit(ctx)
    }

    /// Suppresses emission while a full snapshot is taken.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self, ctx: &mut SerializeContext<'_>) -> Option<MutationData> {
        self.locked = false;
        self.emit(ctx)
    }

    /// Drops everything buffered, keeping the frozen and locked flags.
    pub fn reset(&mut self) {
        self.texts.clear();
        self.text_originals.clear();
        self.attributes.clear();
        self.removes.clear();
        self.map_removes.clear();
        self.moved_map.clear();
        self.added.clear();
        self.moved.clear();
        self.dropped.clear();
    }

    /// Classifies one batch and emits it.
    pub fn process_mutations(
        &mut self,
        ctx: &mut SerializeContext<'_>,
        records: &[MutationRecord],
    ) -> Option<MutationData> {
        self.process(ctx, records);
        self.emit(ctx)
    }

    /// Classifies `records` without emitting.
    pub fn process(&mut self, ctx: &SerializeContext<'_>, records: &[MutationRecord]) {
        for record in records {
            self.process_record(ctx.doc, &*ctx.mirror, ctx.options, record);
        }
    }

    fn process_record(
        &mut self,
        doc: &Document,
        mirror: &Mirror,
        options: &SerializeOptions,
        record: &MutationRecord,
    ) {
        let target = record.target();
        if !doc.contains_key(target) {
            log::debug!(target: "record.mutation", "record for unknown node {target}, skipping");
            return;
        }
        if mirror.get_id(target) == Id::IGNORED {
            return;
        }
        match record {
            MutationRecord::CharacterData { old_value, .. } => {
                if doc.text(target).is_none() {
                    log::debug!(target: "record.mutation", "text record on {target} without character data");
                    return;
                }
                if is_blocked(doc, target, options, false) {
                    return;
                }
                if !self.text_originals.contains_key(&target) {
                    self.texts.push(target);
                    self.text_originals.insert(target, old_value.clone());
                }
            }
            MutationRecord::Attributes { name, old_value, .. } => {
                if doc.element(target).is_none() {
                    log::debug!(target: "record.mutation", "attribute record on non-element {target}");
                    return;
                }
                if is_blocked(doc, target, options, false) {
                    return;
                }
                let index = match self.attributes.iter().position(|a| a.node == target) {
                    Some(index) => index,
                    None => {
                        self.attributes.push(PendingAttributes {
                            node: target,
                            names: Vec::new(),
                            originals: HashMap::new(),
                        });
                        self.attributes.len() - 1
                    }
                };
                let item = &mut self.attributes[index];
                if !item.originals.contains_key(name) {
                    item.names.push(name.clone());
                    item.originals.insert(name.clone(), old_value.clone());
                }
            }
            MutationRecord::ChildList { added, removed, .. } => {
                if is_blocked(doc, target, options, true) {
                    return;
                }
                for &node in added {
                    self.gen_adds(doc, mirror, options, node, Some(target));
                }
                for &node in removed {
                    self.gen_removes(doc, mirror, options, node, target);
                }
            }
        }
    }

    fn gen_adds(
        &mut self,
        doc: &Document,
        mirror: &Mirror,
        options: &SerializeOptions,
        node: NodeKey,
        target: Option<NodeKey>,
    ) {
        if mirror.has_node(node) {
            let id = mirror.get_id(node);
            if id == Id::IGNORED {
                return;
            }
            self.moved.insert(node);
            let target_id = target
                .map(|t| mirror.get_id(t))
                .filter(|&tid| tid != Id::UNKNOWN);
            if let Some(target_id) = target_id {
                self.moved_map.insert((id, target_id));
            }
        } else {
            self.added.insert(node);
            self.dropped.remove(node);
        }

        if !is_blocked(doc, node, options, false) {
            for &child in doc.children(node) {
                self.gen_adds(doc, mirror, options, child, None);
            }
            if let Some(shadow) = doc.shadow_root(node) {
                for &child in doc.children(shadow) {
                    self.gen_adds(doc, mirror, options, child, None);
                }
            }
        }
    }

    fn gen_removes(
        &mut self,
        doc: &Document,
        mirror: &Mirror,
        options: &SerializeOptions,
        node: NodeKey,
        target: NodeKey,
    ) {
        if self.added.contains(node) {
            deep_delete(doc, &mut self.added, node);
            self.dropped.insert(node);
            self.map_removes.push(node);
            return;
        }
        let node_id = mirror.get_id(node);
        if is_blocked(doc, target, options, false) || node_id == Id::IGNORED || !mirror.has_node(node) {
            return;
        }

        let shadow_host = doc.shadow_host(target);
        let parent_id = mirror.get_id(shadow_host.unwrap_or(target));
        if is_ancestor_removed(doc, mirror, target) {
            // Covered by the removal of that ancestor.
        } else if self.moved.contains(node) && self.moved_map.contains(&(node_id, parent_id)) {
            deep_delete(doc, &mut self.moved, node);
        } else {
            self.removes.push(RemovedNode {
                parent_id,
                id: node_id,
                is_shadow: shadow_host.is_some(),
            });
        }
        self.map_removes.push(node);
    }

    /// Builds the payload for everything buffered since the last emit.
    /// `None` while frozen or locked, and when nothing changed.
    pub fn emit(&mut self, ctx: &mut SerializeContext<'_>) -> Option<MutationData> {
        if self.frozen || self.locked {
            return None;
        }
        let doc = ctx.doc;
        for node in self.map_removes.drain(..) {
            ctx.mirror.remove_node_from_map(doc, node);
        }

        let removed_ids: HashSet<Id> = self.removes.iter().map(|r| r.id).collect();
        let mut adds = Vec::new();
        let mut retry = RetryQueue::default();

        for node in self.moved.to_vec() {
            let parent_moved = doc.parent(node).is_some_and(|p| self.moved.contains(p));
            if is_parent_removed(doc, &*ctx.mirror, &removed_ids, node) && !parent_moved {
                continue;
            }
            push_add(ctx, self.root, node, &mut adds, &mut retry);
        }

        for node in self.added.to_vec() {
            let placeable = !is_ancestor_in_set(doc, &self.dropped, node)
                && !is_parent_removed(doc, &*ctx.mirror, &removed_ids, node);
            if placeable || is_ancestor_in_set(doc, &self.moved, node) {
                push_add(ctx, self.root, node, &mut adds, &mut retry);
            } else {
                self.dropped.insert(node);
            }
        }

        drain_retry(ctx, self.root, &mut adds, &mut retry);

        let texts = self.collect_texts(ctx);
        let attributes = self.collect_attributes(ctx);
        let data = MutationData {
            texts,
            attributes,
            removes: std::mem::take(&mut self.removes),
            adds,
            is_attach_iframe: false,
        };
        self.reset();
        if data.is_empty() {
            log::trace!(target: "record.mutation", "batch on {} had no net effect", self.root);
            return None;
        }
        Some(data)
    }

    fn collect_texts(&self, ctx: &SerializeContext<'_>) -> Vec<TextMutation> {
        let doc = ctx.doc;
        let mut texts = Vec::new();
        for &node in &self.texts {
            // A node first seen in this batch is serialized whole by its add.
            if self.added.contains(node) {
                continue;
            }
            let id = ctx.mirror.get_id(node);
            if !ctx.mirror.has(id) {
                continue;
            }
            let Some(current) = doc.text(node) else {
                continue;
            };
            if self.text_originals.get(&node).map(String::as_str) == Some(current) {
                continue;
            }
            let value = if !current.is_empty() && needs_masking_text(doc, node, ctx.options) {
                mask_text(current, ctx.options)
            } else {
                current.to_string()
            };
            texts.push(TextMutation {
                id,
                value: Some(value),
            });
        }
        texts
    }

    fn collect_attributes(&self, ctx: &SerializeContext<'_>) -> Vec<AttributeMutation> {
        let doc = ctx.doc;
        let options = ctx.options;
        let mut out = Vec::new();
        for item in &self.attributes {
            if self.added.contains(item.node) {
                continue;
            }
            let id = ctx.mirror.get_id(item.node);
            if !ctx.mirror.has(id) {
                continue;
            }
            let Some(el) = doc.element(item.node) else {
                continue;
            };
            let tag = el.tag_name();
            let mut changes = BTreeMap::new();
            for name in &item.names {
                let original = item.originals.get(name).cloned().flatten();
                let current = el.attribute(name);
                if current == original.as_deref() {
                    continue;
                }
                match name.as_str() {
                    "style" => {
                        let diff = style_diff(original.as_deref(), current);
                        if !diff.is_empty() {
                            changes.insert(name.clone(), AttributeChange::Style(diff));
                        }
                    }
                    "src" if tag == "iframe" && !current.is_some_and(|s| options.keeps_iframe_src(s)) => {
                        if el.content_document().is_none() {
                            let value = current.map(str::to_string);
                            changes.insert("rr_src".into(), AttributeChange::Value(value));
                        }
                    }
                    _ => {
                        let value = current.map(|value| {
                            if name == "value" {
                                mask_input_value(tag, el.attribute("type"), value, options)
                            } else {
                                transform_attribute(options.base_url.as_ref(), tag, name, value)
                            }
                        });
                        changes.insert(name.clone(), AttributeChange::Value(value));
                    }
                }
            }
            if !changes.is_empty() {
                out.push(AttributeMutation {
                    id,
                    attributes: changes,
                });
            }
        }
        out
    }
}

/// Per-property difference between two inline `style` values. Properties
/// that disappeared are reported as [`StyleChange::Removed`].
pub fn style_diff(old: Option<&str>, new: Option<&str>) -> BTreeMap<String, StyleChange> {
    let old = parse_declarations(old.unwrap_or(""));
    let new = parse_declarations(new.unwrap_or(""));
    let mut diff = BTreeMap::new();
    for decl in &new {
        let unchanged = old
            .iter()
            .rev()
            .find(|o| o.name == decl.name)
            .is_some_and(|o| o.value == decl.value && o.important == decl.important);
        if !unchanged {
            diff.insert(
                decl.name.clone(),
                StyleChange::Set {
                    value: decl.value.clone(),
                    priority: decl.priority().map(str::to_string),
                },
            );
        }
    }
    for decl in &old {
        if !new.iter().any(|n| n.name == decl.name) {
            diff.insert(decl.name.clone(), StyleChange::Removed);
        }
    }
    diff
}

fn deep_delete(doc: &Document, set: &mut NodeSet, node: NodeKey) {
    set.remove(node);
    for &child in doc.children(node) {
        deep_delete(doc, set, child);
    }
    if let Some(shadow) = doc.shadow_root(node) {
        for &child in doc.children(shadow) {
            deep_delete(doc, set, child);
        }
    }
}

fn is_ancestor_removed(doc: &Document, mirror: &Mirror, target: NodeKey) -> bool {
    let mut current = target;
    loop {
        if doc.shadow_host(current).is_some() || doc.kind(current) == Some(NodeKind::Document) {
            return false;
        }
        if !mirror.has(mirror.get_id(current)) {
            return true;
        }
        match doc.parent(current) {
            None => return true,
            Some(parent) if doc.kind(parent) == Some(NodeKind::Document) => return false,
            Some(parent) => current = parent,
        }
    }
}

fn is_parent_removed(doc: &Document, mirror: &Mirror, removed: &HashSet<Id>, node: NodeKey) -> bool {
    if removed.is_empty() {
        return false;
    }
    let mut cursor = doc.parent(node);
    while let Some(parent) = cursor {
        if removed.contains(&mirror.get_id(parent)) {
            return true;
        }
        cursor = doc.parent(parent);
    }
    false
}

fn is_ancestor_in_set(doc: &Document, set: &NodeSet, node: NodeKey) -> bool {
    let mut cursor = doc.parent(node);
    while let Some(parent) = cursor {
        if set.contains(parent) {
            return true;
        }
        cursor = doc.parent(parent);
    }
    false
}

/// Id a replayer attaches `node` under: the host for shadow-root children.
fn parent_id(ctx: &SerializeContext<'_>, node: NodeKey) -> Option<Id> {
    let parent = ctx.doc.parent(node)?;
    let parent = ctx.doc.shadow_host(parent).unwrap_or(parent);
    Some(ctx.mirror.get_id(parent))
}

/// Id of the first following sibling that is not ignored. `None` when the
/// node is last; `Some(UNKNOWN)` when that sibling has no id yet.
fn next_id(ctx: &SerializeContext<'_>, node: NodeKey) -> Option<Id> {
    let mut sibling = ctx.doc.next_sibling(node);
    while let Some(current) = sibling {
        let id = ctx.mirror.get_id(current);
        if id != Id::IGNORED {
            return Some(id);
        }
        sibling = ctx.doc.next_sibling(current);
    }
    None
}

fn resolvable(ctx: &SerializeContext<'_>, node: NodeKey) -> bool {
    parent_id(ctx, node).is_some_and(|id| id != Id::UNKNOWN) && next_id(ctx, node) != Some(Id::UNKNOWN)
}

fn push_add(
    ctx: &mut SerializeContext<'_>,
    root: NodeKey,
    node: NodeKey,
    adds: &mut Vec<AddedNode>,
    retry: &mut RetryQueue,
) {
    let doc = ctx.doc;
    if doc.parent(node).is_none() || doc.owner_root(node) != root {
        return;
    }
    let Some(parent_id) = parent_id(ctx, node) else {
        return;
    };
    if parent_id == Id::IGNORED {
        log::debug!(target: "record.mutation", "{node} sits under an ignored node, dropping it");
        return;
    }
    let next_id = next_id(ctx, node);
    if parent_id == Id::UNKNOWN || next_id == Some(Id::UNKNOWN) {
        retry.push(doc, node);
        return;
    }
    let flags = SerializeFlags::added_node(ctx.options);
    if let Some(serialized) = ctx.serialize_node_with_id(node, flags) {
        adds.push(AddedNode {
            parent_id,
            next_id,
            node: serialized,
        });
    }
}

fn drain_retry(
    ctx: &mut SerializeContext<'_>,
    root: NodeKey,
    adds: &mut Vec<AddedNode>,
    retry: &mut RetryQueue,
) {
    let mut candidate: Option<usize> = None;
    while !retry.nodes.is_empty() {
        let from_candidate = candidate.filter(|&i| i < retry.nodes.len() && resolvable(&*ctx, retry.nodes[i]));
        let pick = from_candidate.or_else(|| {
            (0..retry.nodes.len())
                .rev()
                .find(|&i| resolvable(&*ctx, retry.nodes[i]))
        });
        let Some(index) = pick else {
            log::debug!(
                target: "record.mutation",
                "{} added nodes never resolved a parent or sibling, dropping them",
                retry.nodes.len()
            );
            retry.nodes.clear();
            break;
        };
        let node = retry.nodes.remove(index);
        candidate = index.checked_sub(1);
        push_add(ctx, root, node, adds, retry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_diff_marks_removed_properties() {
        let diff = style_diff(Some("color: red; margin: 0"), Some("color: blue !important"));
        assert_eq!(
            diff.get("color"),
            Some(&StyleChange::Set {
                value: "blue".into(),
                priority: Some("important".into()),
            })
        );
        assert_eq!(diff.get("margin"), Some(&StyleChange::Removed));
        assert!(style_diff(Some("a: b"), Some("a: b")).is_empty());
    }

    #[test]
    fn retry_queue_keeps_siblings_adjacent() {
        let mut doc = Document::new();
        let list = doc.create_element("ul");
        doc.append_child(doc.root(), list).unwrap();
        let items: Vec<_> = (0..3).map(|_| doc.create_element("li")).collect();
        for &item in &items {
            doc.append_child(list, item).unwrap();
        }
        let mut queue = RetryQueue::default();
        queue.push(&doc, items[2]);
        queue.push(&doc, items[0]);
        queue.push(&doc, items[1]);
        queue.push(&doc, items[1]);
        assert_eq!(queue.nodes, vec![items[0], items[1], items[2]]);
    }
}
