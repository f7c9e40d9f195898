//! The replayed document and diff-record application.
//!
//! Application order within one record is removes, adds, texts, then
//! attributes. Every entry stands alone: an entry that references an id the
//! mirror does not know is logged and skipped, and the rest of the record
//! still applies. Adds whose parent or next sibling is not known yet wait in
//! a queue keyed by the missing id until that id is registered or the wait
//! times out.

use crate::rebuild::{self, apply_attribute, is_form_control, scroll_target, shadow_container};
use core_types::Id;
use css::Declaration;
use dom::{Document, DomError, NodeKey, NodeKind, ScrollOffset};
use events::{AddedNode, AttributeChange, MutationData, SerializedData, SerializedNode, StyleChange};
use snapshot::Mirror;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Per-record counters, mostly useful to tests and debug logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
    pub deferred: usize,
}

#[derive(Debug)]
struct QueuedAdd {
    add: AddedNode,
    queued_at: Duration,
}

#[derive(Debug, Default)]
struct PendingAdds {
    by_missing: HashMap<Id, Vec<QueuedAdd>>,
}

impl PendingAdds {
    fn len(&self) -> usize {
        self.by_missing.values().map(Vec::len).sum()
    }

    fn push(&mut self, missing: Id, add: AddedNode, now: Duration) {
        self.by_missing
            .entry(missing)
            .or_default()
            .push(QueuedAdd { add, queued_at: now });
    }

    fn take(&mut self, id: Id) -> Vec<QueuedAdd> {
        self.by_missing.remove(&id).unwrap_or_default()
    }

    fn expire(&mut self, now: Duration, timeout: Duration) -> usize {
        let mut expired = 0;
        self.by_missing.retain(|missing, queue| {
            queue.retain(|entry| {
                let keep = now.saturating_sub(entry.queued_at) < timeout;
                if !keep {
                    log::warn!(
                        target: "replay.apply",
                        "dropping add of {} still waiting for {missing}",
                        entry.add.node.id
                    );
                    expired += 1;
                }
                keep
            });
            !queue.is_empty()
        });
        expired
    }
}

pub struct ReplayTree {
    doc: Document,
    mirror: Mirror,
    pending: PendingAdds,
    pending_timeout: Duration,
}

impl ReplayTree {
    /// Builds the tree for a full snapshot. `None` when the snapshot root is
    /// not a document.
    pub fn from_snapshot(node: &SerializedNode, pending_timeout: Duration) -> Option<Self> {
        let (doc, mirror) = rebuild::rebuild(node)?;
        Some(Self {
            doc,
            mirror,
            pending: PendingAdds::default(),
            pending_timeout,
        })
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn root(&self) -> NodeKey {
        self.doc.root()
    }

    pub fn node(&self, id: Id) -> Option<NodeKey> {
        self.mirror.get_node(id)
    }

    /// Adds still waiting for a parent or sibling.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn set_pending_timeout(&mut self, timeout: Duration) {
        self.pending_timeout = timeout;
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Document, &mut Mirror) {
        (&mut self.doc, &mut self.mirror)
    }

    /// Drops queued adds older than the pending timeout.
    pub fn expire_pending(&mut self, now: Duration) -> usize {
        self.pending.expire(now, self.pending_timeout)
    }

    pub fn apply_mutation(&mut self, data: &MutationData, now: Duration) -> ApplyReport {
        let mut report = ApplyReport::default();
        self.expire_pending(now);

        for remove in &data.removes {
            if self.remove(remove.parent_id, remove.id) {
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }

        for add in &data.adds {
            self.add(add.clone(), now, &mut report);
        }

        for text in &data.texts {
            let Some(node) = self.mirror.get_node(text.id) else {
                log::debug!(target: "replay.apply", "text change for unknown node {}", text.id);
                report.skipped += 1;
                continue;
            };
            match self.set_text(node, text.value.as_deref().unwrap_or("")) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    log::debug!(target: "replay.apply", "text change on {}: {err}", text.id);
                    report.skipped += 1;
                }
            }
        }

        for mutation in &data.attributes {
            for (name, change) in &mutation.attributes {
                // Re-resolved per attribute: `_cssText` can swap the node.
                let Some(node) = self.mirror.get_node(mutation.id) else {
                    log::debug!(target: "replay.apply", "attribute change for unknown node {}", mutation.id);
                    report.skipped += 1;
                    break;
                };
                match self.apply_attribute_change(mutation.id, node, name, change) {
                    Ok(()) => report.applied += 1,
                    Err(err) => {
                        log::debug!(target: "replay.apply", "attribute {name} on {}: {err}", mutation.id);
                        report.skipped += 1;
                    }
                }
            }
        }

        if report.skipped > 0 || report.deferred > 0 {
            log::debug!(target: "replay.apply", "{report:?}");
        }
        report
    }

    /// Removing an id the mirror no longer maps is a no-op.
    fn remove(&mut self, parent_id: Id, id: Id) -> bool {
        let Some(target) = self.mirror.get_node(id) else {
            log::debug!(target: "replay.apply", "remove of unknown node {id}");
            return false;
        };
        let Some(parent) = self.mirror.get_node(parent_id) else {
            log::warn!(target: "replay.apply", "remove of {id}: parent {parent_id} is unknown");
            return false;
        };
        let actual = self.doc.parent(target);
        let under_parent = actual == Some(parent)
            || actual.and_then(|p| self.doc.shadow_host(p)) == Some(parent);
        if !under_parent {
            log::warn!(target: "replay.apply", "remove of {id}: not a child of {parent_id}");
            return false;
        }
        rebuild::forget_subtree(&self.doc, &mut self.mirror, target);
        if let Err(err) = self.doc.remove(target) {
            log::warn!(target: "replay.apply", "remove of {id}: {err}");
            return false;
        }
        true
    }

    fn add(&mut self, add: AddedNode, now: Duration, report: &mut ApplyReport) {
        let mut work = vec![add];
        while let Some(add) = work.pop() {
            if let Some(missing) = self.missing_reference(&add) {
                log::debug!(
                    target: "replay.apply",
                    "add of {} waits for {missing}",
                    add.node.id
                );
                self.pending.push(missing, add, now);
                report.deferred += 1;
                continue;
            }
            let Some(key) = self.insert(&add) else {
                report.skipped += 1;
                continue;
            };
            report.applied += 1;

            let mut registered = Vec::new();
            add.node.walk(&mut |n| registered.push(n.id));
            log::trace!(target: "replay.apply", "placed {} as {key}", add.node.id);
            // Newly resolvable adds run before the rest of this record's
            // queue so parents land before their children.
            for id in registered.into_iter().rev() {
                work.extend(self.pending.take(id).into_iter().rev().map(|q| q.add));
            }
        }
    }

    /// The first id the add refers to that is not mapped yet.
    fn missing_reference(&self, add: &AddedNode) -> Option<Id> {
        if !self.mirror.has(add.parent_id) {
            return Some(add.parent_id);
        }
        add.next_id.filter(|&next| !self.mirror.has(next))
    }

    fn insert(&mut self, add: &AddedNode) -> Option<NodeKey> {
        let parent = self.mirror.get_node(add.parent_id)?;
        if let SerializedData::Document { .. } = add.node.data {
            return self.attach_document(parent, &add.node);
        }

        let container = if add.node.is_shadow {
            match shadow_container(&mut self.doc, parent) {
                Ok(shadow) => shadow,
                Err(err) => {
                    log::warn!(target: "replay.apply", "shadow add of {}: {err}", add.node.id);
                    return None;
                }
            }
        } else {
            parent
        };

        let reference = add.next_id.and_then(|next| self.mirror.get_node(next));
        let reference = reference.filter(|&r| {
            let placed = self.doc.parent(r) == Some(container);
            if !placed {
                log::debug!(target: "replay.apply", "next sibling of {} is elsewhere, appending", add.node.id);
            }
            placed
        });

        let key = match self.reusable(&add.node) {
            Some(existing) => existing,
            None => rebuild::build_node(&mut self.doc, &mut self.mirror, &add.node),
        };
        match self.doc.insert_before(container, key, reference) {
            Ok(()) => Some(key),
            Err(err) => {
                log::warn!(target: "replay.apply", "add of {} under {}: {err}", add.node.id, add.parent_id);
                self.mirror.remove_node_from_map(&self.doc, key);
                None
            }
        }
    }

    /// A node already mapped under the add's id with the same shape is moved
    /// instead of rebuilt.
    fn reusable(&self, node: &SerializedNode) -> Option<NodeKey> {
        let existing = self.mirror.get_node(node.id)?;
        let meta = self.mirror.get_meta(existing)?;
        (meta.node_type == node.node_type() && meta.tag_name.as_deref() == node.tag_name())
            .then_some(existing)
    }

    fn attach_document(&mut self, frame: NodeKey, node: &SerializedNode) -> Option<NodeKey> {
        if let Some(previous) = self.doc.content_document(frame) {
            rebuild::forget_subtree(&self.doc, &mut self.mirror, previous);
        }
        rebuild::attach_content(&mut self.doc, &mut self.mirror, frame, node)
    }

    /// Sets character data, or replaces an element's children with a single
    /// text node.
    fn set_text(&mut self, node: NodeKey, value: &str) -> Result<(), DomError> {
        if self.doc.kind(node) != Some(NodeKind::Element) {
            return self.doc.set_text(node, value);
        }
        for child in self.doc.children(node).to_vec() {
            self.mirror.remove_node_from_map(&self.doc, child);
            self.doc.remove(child)?;
        }
        let text = self.doc.create_text(value);
        self.doc.append_child(node, text)
    }

    fn apply_attribute_change(
        &mut self,
        id: Id,
        node: NodeKey,
        name: &str,
        change: &AttributeChange,
    ) -> Result<(), DomError> {
        match change {
            AttributeChange::Value(Some(css)) if name == "_cssText" => self.apply_css_text(id, node, css),
            AttributeChange::Value(value) => apply_attribute(&mut self.doc, node, name, value.as_deref()),
            AttributeChange::Style(diff) => apply_style_diff(&mut self.doc, node, diff),
        }
    }

    /// A loaded stylesheet: `<style>` gets the text as its content, a
    /// `<link>` is swapped for an equivalent `<style>` under the same id.
    fn apply_css_text(&mut self, id: Id, node: NodeKey, css: &str) -> Result<(), DomError> {
        match self.doc.tag_name(node) {
            Some("style") => self.set_text(node, css),
            Some("link") => {
                let parent = self.doc.parent(node).ok_or(DomError::NotAChild {
                    parent: self.doc.root(),
                    child: node,
                })?;
                let style = self.doc.create_element("style");
                let attributes: Vec<(String, String)> = self
                    .doc
                    .element(node)
                    .map(|el| el.attributes().to_vec())
                    .unwrap_or_default();
                for (name, value) in attributes {
                    if name != "rel" && name != "href" {
                        self.doc.set_attribute(style, &name, &value)?;
                    }
                }
                let text = self.doc.create_text(css);
                self.doc.append_child(style, text)?;
                self.doc.insert_before(parent, style, Some(node))?;
                self.doc.remove(node)?;
                self.mirror.replace(id, style);
                Ok(())
            }
            _ => {
                log::debug!(target: "replay.apply", "stylesheet text for non-style node {id}");
                Ok(())
            }
        }
    }

    /// Applies an input event's value and, for toggles, checked state.
    pub fn apply_input(&mut self, id: Id, text: &str, is_checked: bool) -> bool {
        let Some(node) = self.mirror.get_node(id).filter(|&n| is_form_control(&self.doc, n)) else {
            log::debug!(target: "replay.apply", "input for unknown control {id}");
            return false;
        };
        let toggle = matches!(self.doc.attribute(node, "type"), Some("radio" | "checkbox"));
        let result = if toggle {
            self.doc.set_checked(node, is_checked)
        } else {
            self.doc.set_value(node, text)
        };
        result.is_ok()
    }

    pub fn apply_scroll(&mut self, id: Id, x: f64, y: f64) -> bool {
        let Some(target) = self
            .mirror
            .get_node(id)
            .and_then(|n| scroll_target(&self.doc, n))
        else {
            log::debug!(target: "replay.apply", "scroll of unknown node {id}");
            return false;
        };
        self.doc
            .set_scroll(target, ScrollOffset { left: x, top: y })
            .is_ok()
    }
}

/// Rewrites the `style` attribute one property at a time.
fn apply_style_diff(
    doc: &mut Document,
    node: NodeKey,
    diff: &BTreeMap<String, StyleChange>,
) -> Result<(), DomError> {
    let mut declarations = css::parse_declarations(doc.attribute(node, "style").unwrap_or(""));
    for (property, change) in diff {
        match change {
            StyleChange::Unchanged => {}
            StyleChange::Removed => declarations.retain(|d| d.name != *property),
            StyleChange::Set { value, priority } => {
                let important = priority.as_deref() == Some("important");
                let declaration = Declaration::new(property.as_str(), value.as_str(), important);
                match declarations.iter_mut().find(|d| d.name == *property) {
                    Some(existing) => *existing = declaration,
                    None => declarations.push(declaration),
                }
            }
        }
    }
    if declarations.is_empty() {
        doc.remove_attribute(node, "style")
    } else {
        doc.set_attribute(node, "style", &css::serialize_declarations(&declarations))
    }
}
