//! Elements whose content arrives after they were serialized: iframes whose
//! document has not loaded yet and stylesheet links whose sheet is not
//! available. Each waits until it resolves or its deadline passes.

use dom::{Document, NodeKey};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadKind {
    Iframe,
    Stylesheet,
}

#[derive(Clone, Copy, Debug)]
struct PendingLoad {
    node: NodeKey,
    kind: LoadKind,
    deadline: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct PendingLoads {
    entries: Vec<PendingLoad>,
}

impl PendingLoads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for `node` until `deadline`. A node already waiting keeps its
    /// original deadline.
    pub fn register(&mut self, node: NodeKey, kind: LoadKind, deadline: Duration) {
        if self.contains(node, kind) {
            return;
        }
        log::trace!(target: "snapshot.pending", "waiting for {kind:?} {node}");
        self.entries.push(PendingLoad {
            node,
            kind,
            deadline,
        });
    }

    pub fn contains(&self, node: NodeKey, kind: LoadKind) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.node == node && entry.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes and returns the entries that have loaded, in registration
    /// order. Entries past their deadline are dropped.
    pub fn take_ready(&mut self, doc: &Document, now: Duration) -> Vec<(NodeKey, LoadKind)> {
        let mut ready = Vec::new();
        self.entries.retain(|entry| {
            if is_loaded(doc, entry) {
                ready.push((entry.node, entry.kind));
                false
            } else if now >= entry.deadline || !doc.contains_key(entry.node) {
                log::debug!(
                    target: "snapshot.pending",
                    "{:?} {} did not load in time, skipping it",
                    entry.kind,
                    entry.node
                );
                false
            } else {
                true
            }
        });
        ready
    }
}

fn is_loaded(doc: &Document, entry: &PendingLoad) -> bool {
    let Some(el) = doc.element(entry.node) else {
        return false;
    };
    match entry.kind {
        LoadKind::Iframe => el.content_document().is_some() && el.is_loaded(),
        LoadKind::Stylesheet => el.sheet.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_when_content_arrives() {
        let mut doc = Document::new();
        let frame = doc.create_element("iframe");
        let link = doc.create_element("link");
        let mut pending = PendingLoads::new();
        pending.register(frame, LoadKind::Iframe, Duration::from_millis(100));
        pending.register(link, LoadKind::Stylesheet, Duration::from_millis(100));
        pending.register(link, LoadKind::Stylesheet, Duration::from_millis(900));
        assert_eq!(pending.len(), 2);

        assert!(pending.take_ready(&doc, Duration::from_millis(10)).is_empty());

        doc.set_sheet(link, "a { color: red }").unwrap();
        let inner = doc.create_document();
        doc.set_content_document(frame, inner).unwrap();
        assert_eq!(
            pending.take_ready(&doc, Duration::from_millis(20)),
            vec![(link, LoadKind::Stylesheet)]
        );

        doc.mark_loaded(frame).unwrap();
        assert_eq!(
            pending.take_ready(&doc, Duration::from_millis(30)),
            vec![(frame, LoadKind::Iframe)]
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn timed_out_entries_are_dropped() {
        let mut doc = Document::new();
        let frame = doc.create_element("iframe");
        let mut pending = PendingLoads::new();
        pending.register(frame, LoadKind::Iframe, Duration::from_millis(100));
        assert!(pending.take_ready(&doc, Duration::from_millis(100)).is_empty());
        assert!(pending.is_empty());

        // Late content is not picked up any more.
        let inner = doc.create_document();
        doc.set_content_document(frame, inner).unwrap();
        doc.mark_loaded(frame).unwrap();
        assert!(pending.take_ready(&doc, Duration::from_millis(200)).is_empty());
    }
}
