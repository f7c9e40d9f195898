//! Keyed reconciliation of a live subtree against a target snapshot.
//!
//! Children are matched by id with the four-pointer list diff: old head
//! against new head, old tail against new tail, then the two crossings. When
//! all four miss, an index of the remaining old children finds a node to move
//! into place; only ids with no reusable node are built from scratch. Old
//! children left over at the end are removed, new ones are inserted in order.
//!
//! Complexity is linear in the child count for appends, removals and single
//! moves; arbitrary permutations fall back to the index.

use crate::rebuild::{self, apply_attribute, shadow_container};
use core_types::Id;
use dom::{Document, NodeKey, NodeKind};
use events::{SerializedData, SerializedNode};
use snapshot::Mirror;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub moved: usize,
    pub removed: usize,
    pub updated: usize,
}

/// Makes the subtree at `node` match `target`. `node` must already be the
/// live counterpart of `target`.
pub fn reconcile(
    doc: &mut Document,
    mirror: &mut Mirror,
    node: NodeKey,
    target: &SerializedNode,
    stats: &mut ReconcileStats,
) {
    update_node(doc, mirror, node, target, stats);

    let mut light = Vec::new();
    let mut shadow = Vec::new();
    let mut content = None;
    for child in &target.child_nodes {
        match child.data {
            SerializedData::Document { .. } if doc.kind(node) == Some(NodeKind::Element) => {
                content = Some(child);
            }
            _ if child.is_shadow => shadow.push(child),
            _ => light.push(child),
        }
    }

    reconcile_children(doc, mirror, node, &light, stats);
    if !shadow.is_empty() || doc.shadow_root(node).is_some() {
        match shadow_container(doc, node) {
            Ok(root) => reconcile_children(doc, mirror, root, &shadow, stats),
            Err(err) => log::warn!(target: "replay.reconcile", "shadow root of {}: {err}", target.id),
        }
    }
    if let Some(content) = content {
        reconcile_content(doc, mirror, node, content, stats);
    }
}

fn reconcile_content(
    doc: &mut Document,
    mirror: &mut Mirror,
    frame: NodeKey,
    target: &SerializedNode,
    stats: &mut ReconcileStats,
) {
    match doc.content_document(frame) {
        Some(current) if mirror.get_id(current) == target.id => {
            reconcile(doc, mirror, current, target, stats);
        }
        current => {
            if let Some(current) = current {
                rebuild::forget_subtree(doc, mirror, current);
                stats.removed += 1;
            }
            if rebuild::attach_content(doc, mirror, frame, target).is_some() {
                stats.created += 1;
            }
        }
    }
}

/// Same id and the same kind of node.
fn same(doc: &Document, mirror: &Mirror, key: NodeKey, target: &SerializedNode) -> bool {
    if mirror.get_id(key) != target.id {
        return false;
    }
    match (doc.element(key), &target.data) {
        (Some(el), SerializedData::Element { tag_name, .. }) => el.tag_name() == tag_name,
        (Some(_), _) => false,
        (None, data) => mirror
            .get_meta(key)
            .is_some_and(|meta| meta.node_type == data.node_type()),
    }
}

fn reconcile_children(
    doc: &mut Document,
    mirror: &mut Mirror,
    parent: NodeKey,
    new: &[&SerializedNode],
    stats: &mut ReconcileStats,
) {
    let mut old: Vec<Option<NodeKey>> = doc.children(parent).iter().copied().map(Some).collect();
    let (mut old_start, mut old_end) = (0, old.len());
    let (mut new_start, mut new_end) = (0, new.len());
    let mut old_index: Option<HashMap<Id, usize>> = None;

    while old_start < old_end && new_start < new_end {
        let Some(old_head) = old[old_start] else {
            old_start += 1;
            continue;
        };
        let Some(old_tail) = old[old_end - 1] else {
            old_end -= 1;
            continue;
        };
        let new_head = new[new_start];
        let new_tail = new[new_end - 1];

        if same(doc, mirror, old_head, new_head) {
            reconcile(doc, mirror, old_head, new_head, stats);
            old_start += 1;
            new_start += 1;
        } else if same(doc, mirror, old_tail, new_tail) {
            reconcile(doc, mirror, old_tail, new_tail, stats);
            old_end -= 1;
            new_end -= 1;
        } else if same(doc, mirror, old_head, new_tail) {
            reconcile(doc, mirror, old_head, new_tail, stats);
            let after_tail = doc.next_sibling(old_tail);
            move_before(doc, parent, old_head, after_tail, stats);
            old_start += 1;
            new_end -= 1;
        } else if same(doc, mirror, old_tail, new_head) {
            reconcile(doc, mirror, old_tail, new_head, stats);
            move_before(doc, parent, old_tail, Some(old_head), stats);
            old_end -= 1;
            new_start += 1;
        } else {
            let index = old_index.get_or_insert_with(|| {
                (old_start..old_end)
                    .filter_map(|i| old[i].map(|key| (mirror.get_id(key), i)))
                    .collect()
            });
            let reusable = index
                .get(&new_head.id)
                .copied()
                .filter(|&i| old[i].is_some_and(|key| same(doc, mirror, key, new_head)));
            match reusable {
                Some(i) => {
                    let key = old[i].take();
                    if let Some(key) = key {
                        reconcile(doc, mirror, key, new_head, stats);
                        move_before(doc, parent, key, Some(old_head), stats);
                    }
                }
                None => create_before(doc, mirror, parent, new_head, Some(old_head), stats),
            }
            new_start += 1;
        }
    }

    if old_start >= old_end {
        let reference = new.get(new_end).and_then(|n| mirror.get_node(n.id));
        for target in &new[new_start..new_end] {
            create_before(doc, mirror, parent, target, reference, stats);
        }
    } else {
        for key in old[old_start..old_end].iter().flatten() {
            rebuild::forget_subtree(doc, mirror, *key);
            match doc.remove(*key) {
                Ok(()) => stats.removed += 1,
                Err(err) => log::warn!(target: "replay.reconcile", "cannot remove {key}: {err}"),
            }
        }
    }
}

fn move_before(
    doc: &mut Document,
    parent: NodeKey,
    node: NodeKey,
    reference: Option<NodeKey>,
    stats: &mut ReconcileStats,
) {
    match doc.insert_before(parent, node, reference) {
        Ok(()) => stats.moved += 1,
        Err(err) => log::warn!(target: "replay.reconcile", "cannot move {node}: {err}"),
    }
}

fn create_before(
    doc: &mut Document,
    mirror: &mut Mirror,
    parent: NodeKey,
    target: &SerializedNode,
    reference: Option<NodeKey>,
    stats: &mut ReconcileStats,
) {
    let key = rebuild::build_node(doc, mirror, target);
    match doc.insert_before(parent, key, reference) {
        Ok(()) => stats.created += 1,
        Err(err) => {
            log::warn!(target: "replay.reconcile", "cannot insert {}: {err}", target.id);
            mirror.remove_node_from_map(doc, key);
        }
    }
}

fn update_node(
    doc: &mut Document,
    mirror: &Mirror,
    node: NodeKey,
    target: &SerializedNode,
    stats: &mut ReconcileStats,
) {
    match &target.data {
        SerializedData::Element { attributes, .. } => {
            let current: Vec<(String, String)> = doc
                .element(node)
                .map(|el| el.attributes().to_vec())
                .unwrap_or_default();
            let mut changed = false;
            for (name, _) in &current {
                if !attributes.contains_key(name) {
                    changed |= apply_attribute(doc, node, name, None).is_ok();
                }
            }
            for (name, value) in attributes {
                let synthetic = name.starts_with("rr_") || name == "_cssText";
                let differs = !current.iter().any(|(k, v)| k == name && v == value);
                if synthetic || differs {
                    let applied = apply_attribute(doc, node, name, Some(value)).is_ok();
                    changed |= applied && differs && !synthetic;
                }
            }
            if changed {
                stats.updated += 1;
            }
        }
        SerializedData::Text { text_content, .. }
        | SerializedData::CData { text_content }
        | SerializedData::Comment { text_content } => {
            if doc.text(node) != Some(text_content.as_str()) {
                match doc.set_text(node, text_content) {
                    Ok(()) => stats.updated += 1,
                    Err(err) => log::debug!(target: "replay.reconcile", "text of {}: {err}", mirror.get_id(node)),
                }
            }
        }
        SerializedData::Document { .. } | SerializedData::DocumentType { .. } => {}
    }
}
