//! Cross-context id remapping.
//!
//! A frame whose content the recorder cannot serialize directly (another
//! origin) runs its own recorder and forwards its events. Those events carry
//! ids from the frame's own generator; before they enter the session every
//! id is translated into the session's id space through a per-frame
//! [`CrossContextMirror`].

use core_types::{Id, IdGenerator};
use dom::NodeKey;
use events::{AddedNode, Event, EventData, IncrementalData, MutationData, SerializedNode};
use std::collections::HashMap;

/// Two-way map between the ids of one remote context and local ids.
#[derive(Clone, Debug, Default)]
pub struct CrossContextMirror {
    remote_to_local: HashMap<i64, i64>,
    local_to_remote: HashMap<i64, i64>,
}

impl CrossContextMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local id for `remote`, generating one on first sight.
    pub fn local_id(&mut self, remote: i64, generate: &mut impl FnMut() -> i64) -> i64 {
        if let Some(&local) = self.remote_to_local.get(&remote) {
            return local;
        }
        let local = generate();
        self.remote_to_local.insert(remote, local);
        self.local_to_remote.insert(local, remote);
        local
    }

    /// Remote id `local` was generated for, `-1` when there is none.
    pub fn remote_id(&self, local: i64) -> i64 {
        self.local_to_remote
            .get(&local)
            .copied()
            .unwrap_or(Id::UNKNOWN.as_raw())
    }

    pub fn len(&self) -> usize {
        self.remote_to_local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remote_to_local.is_empty()
    }

    pub fn reset(&mut self) {
        self.remote_to_local.clear();
        self.local_to_remote.clear();
    }
}

#[derive(Debug, Default)]
struct FrameMaps {
    nodes: CrossContextMirror,
    styles: CrossContextMirror,
}

/// Tracks the frames of a recording and translates events forwarded from
/// cross-origin ones.
#[derive(Debug)]
pub struct IframeManager {
    frames: HashMap<NodeKey, FrameMaps>,
    next_style_id: i64,
}

impl Default for IframeManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Translation state for one event: the frame's maps plus the generators
/// new local ids come from.
struct Remap<'a> {
    maps: &'a mut FrameMaps,
    ids: &'a mut IdGenerator,
    next_style_id: &'a mut i64,
}

impl Remap<'_> {
    fn id(&mut self, remote: Id) -> Id {
        if !remote.is_assigned() {
            return remote;
        }
        let ids = &mut *self.ids;
        let local = self
            .maps
            .nodes
            .local_id(remote.as_raw(), &mut || ids.next_id().as_raw());
        Id::from_raw(local)
    }

    fn style_id(&mut self, remote: i64) -> i64 {
        let counter = &mut *self.next_style_id;
        self.maps.styles.local_id(remote, &mut || {
            *counter += 1;
            *counter
        })
    }

    fn node(&mut self, node: &mut SerializedNode) {
        node.walk_mut(&mut |n| {
            n.id = self.id(n.id);
            n.root_id = n.root_id.map(|root| self.id(root));
        });
    }

    fn mutation(&mut self, data: &mut MutationData) {
        for add in &mut data.adds {
            add.parent_id = self.id(add.parent_id);
            add.next_id = add.next_id.map(|next| self.id(next));
            self.node(&mut add.node);
        }
        for remove in &mut data.removes {
            remove.parent_id = self.id(remove.parent_id);
            remove.id = self.id(remove.id);
        }
        for attribute in &mut data.attributes {
            attribute.id = self.id(attribute.id);
        }
        for text in &mut data.texts {
            text.id = self.id(text.id);
        }
    }

    fn payload(&mut self, value: &mut serde_json::Value) {
        let Some(object) = value.as_object_mut() else {
            return;
        };
        for key in ["id", "parentId", "previousId", "nextId"] {
            let Some(raw) = object.get(key).and_then(serde_json::Value::as_i64) else {
                continue;
            };
            let local = self.id(Id::from_raw(raw));
            object.insert(key.to_string(), local.as_raw().into());
        }
    }
}

impl IframeManager {
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
            next_style_id: 0,
        }
    }

    /// Starts tracking `frame`. Tracking twice keeps the existing maps.
    pub fn add_iframe(&mut self, frame: NodeKey) {
        self.frames.entry(frame).or_default();
    }

    pub fn is_tracked(&self, frame: NodeKey) -> bool {
        self.frames.contains_key(&frame)
    }

    /// The node-id map of `frame`, if it is tracked.
    pub fn mirror(&self, frame: NodeKey) -> Option<&CrossContextMirror> {
        self.frames.get(&frame).map(|maps| &maps.nodes)
    }

    /// Mutation attaching a loaded frame document under the frame element.
    pub fn attach_iframe(frame_id: Id, document: SerializedNode) -> MutationData {
        MutationData {
            adds: vec![AddedNode {
                parent_id: frame_id,
                next_id: None,
                node: document,
            }],
            is_attach_iframe: true,
            ..MutationData::default()
        }
    }

    /// Rewrites `event`, forwarded from the context inside `frame`, into the
    /// session's id space. `frame_id` is the frame element's local id. Returns
    /// `None` for events that have no meaning outside the frame.
    pub fn transform_cross_origin_event(
        &mut self,
        frame: NodeKey,
        frame_id: Id,
        ids: &mut IdGenerator,
        mut event: Event,
    ) -> Option<Event> {
        let maps = self.frames.entry(frame).or_default();
        if event.is_full_snapshot() {
            maps.nodes.reset();
            maps.styles.reset();
        }
        let mut remap = Remap {
            maps,
            ids,
            next_style_id: &mut self.next_style_id,
        };

        match &mut event.data {
            EventData::FullSnapshot(full) => {
                let mut node = full.node.clone();
                remap.node(&mut node);
                let data = Self::attach_iframe(frame_id, node);
                return Some(Event::incremental(IncrementalData::Mutation(data), event.timestamp));
            }
            EventData::Meta(_) | EventData::Load {} | EventData::DomContentLoaded {} => return None,
            EventData::Plugin(_) => {}
            EventData::Custom(custom) => remap.payload(&mut custom.payload),
            EventData::IncrementalSnapshot(data) => match data {
                IncrementalData::Mutation(mutation) => remap.mutation(mutation),
                IncrementalData::MouseMove(moves)
                | IncrementalData::TouchMove(moves)
                | IncrementalData::Drag(moves) => {
                    for position in &mut moves.positions {
                        position.id = remap.id(position.id);
                    }
                }
                IncrementalData::ViewportResize(_) => return None,
                IncrementalData::MouseInteraction(d) => d.id = remap.id(d.id),
                IncrementalData::Scroll(d) => d.id = remap.id(d.id),
                IncrementalData::Input(d) => d.id = remap.id(d.id),
                IncrementalData::MediaInteraction(d) => d.id = remap.id(d.id),
                IncrementalData::CanvasMutation(d) => d.id = remap.id(d.id),
                IncrementalData::StyleSheetRule(d) => {
                    d.id = d.id.map(|id| remap.id(id));
                    d.style_id = d.style_id.map(|id| remap.style_id(id));
                }
                IncrementalData::StyleDeclaration(d) => {
                    d.id = d.id.map(|id| remap.id(id));
                    d.style_id = d.style_id.map(|id| remap.style_id(id));
                }
                IncrementalData::Font(_) | IncrementalData::Log(_) => {}
                IncrementalData::Selection(d) => {
                    for range in &mut d.ranges {
                        range.start = remap.id(range.start);
                        range.end = remap.id(range.end);
                    }
                }
                IncrementalData::AdoptedStyleSheet(d) => {
                    d.id = remap.id(d.id);
                    for style_id in &mut d.style_ids {
                        *style_id = remap.style_id(*style_id);
                    }
                    for style in &mut d.styles {
                        style.style_id = remap.style_id(style.style_id);
                    }
                }
            },
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Document;
    use events::{
        FullSnapshotData, InitialOffset, MetaData, MousePosition, MouseMoveData, RemovedNode,
        SerializedData,
    };

    fn element(id: i64, tag: &str) -> SerializedNode {
        SerializedNode::new(
            Id::from_raw(id),
            SerializedData::Element {
                tag_name: tag.into(),
                attributes: Default::default(),
                is_svg: false,
                need_block: false,
                is_shadow_host: false,
            },
        )
    }

    fn frame() -> NodeKey {
        let mut doc = Document::new();
        doc.create_element("iframe")
    }

    #[test]
    fn mirror_generates_once_per_remote_id() {
        let mut mirror = CrossContextMirror::new();
        let mut next = 100;
        let mut generate = || {
            next += 1;
            next
        };
        assert_eq!(mirror.local_id(1, &mut generate), 101);
        assert_eq!(mirror.local_id(2, &mut generate), 102);
        assert_eq!(mirror.local_id(1, &mut generate), 101);
        assert_eq!(mirror.remote_id(102), 2);
        assert_eq!(mirror.remote_id(7), -1);
        mirror.reset();
        assert!(mirror.is_empty());
    }

    #[test]
    fn child_full_snapshot_becomes_attach_mutation() {
        let frame = frame();
        let mut manager = IframeManager::new();
        let mut ids = IdGenerator::new();
        for _ in 0..10 {
            ids.next_id();
        }
        let mut root = SerializedNode::new(Id::FIRST, SerializedData::Document { compat_mode: None });
        root.child_nodes.push(element(2, "body"));
        let event = Event::new(
            EventData::FullSnapshot(FullSnapshotData {
                node: root,
                initial_offset: InitialOffset::default(),
            }),
            50,
        );

        let out = manager
            .transform_cross_origin_event(frame, Id::from_raw(4), &mut ids, event)
            .unwrap();
        let EventData::IncrementalSnapshot(IncrementalData::Mutation(data)) = out.data else {
            panic!("expected a mutation, got {:?}", out.data);
        };
        assert!(data.is_attach_iframe);
        assert_eq!(data.adds[0].parent_id, Id::from_raw(4));
        assert_eq!(data.adds[0].next_id, None);
        assert_eq!(data.adds[0].node.id, Id::from_raw(11));
        assert_eq!(data.adds[0].node.child_nodes[0].id, Id::from_raw(12));
        assert_eq!(out.timestamp, 50);
    }

    #[test]
    fn ids_in_incremental_events_are_remapped() {
        let frame = frame();
        let mut manager = IframeManager::new();
        let mut ids = IdGenerator::new();
        let moves = Event::incremental(
            IncrementalData::MouseMove(MouseMoveData {
                positions: vec![MousePosition {
                    x: 1.0,
                    y: 2.0,
                    id: Id::from_raw(3),
                    time_offset: 0,
                }],
            }),
            10,
        );
        let out = manager
            .transform_cross_origin_event(frame, Id::from_raw(9), &mut ids, moves)
            .unwrap();
        let EventData::IncrementalSnapshot(IncrementalData::MouseMove(data)) = out.data else {
            panic!("expected mouse move");
        };
        assert_eq!(data.positions[0].id, Id::FIRST);

        let removal = Event::incremental(
            IncrementalData::Mutation(MutationData {
                removes: vec![RemovedNode {
                    parent_id: Id::from_raw(5),
                    id: Id::from_raw(3),
                    is_shadow: false,
                }],
                ..MutationData::default()
            }),
            11,
        );
        let out = manager
            .transform_cross_origin_event(frame, Id::from_raw(9), &mut ids, removal)
            .unwrap();
        let EventData::IncrementalSnapshot(IncrementalData::Mutation(data)) = out.data else {
            panic!("expected mutation");
        };
        assert_eq!(data.removes[0].id, Id::FIRST);
        assert_eq!(data.removes[0].parent_id, Id::from_raw(2));
        assert_eq!(manager.mirror(frame).unwrap().remote_id(2), 5);
    }

    #[test]
    fn frame_local_events_are_dropped() {
        let frame = frame();
        let mut manager = IframeManager::new();
        let mut ids = IdGenerator::new();
        let meta = Event::new(
            EventData::Meta(MetaData {
                href: "https://inner.test/".into(),
                width: 10,
                height: 10,
            }),
            1,
        );
        assert!(
            manager
                .transform_cross_origin_event(frame, Id::from_raw(2), &mut ids, meta)
                .is_none()
        );
        let resize = Event::incremental(
            IncrementalData::ViewportResize(events::ViewportResizeData {
                width: 1,
                height: 1,
            }),
            2,
        );
        assert!(
            manager
                .transform_cross_origin_event(frame, Id::from_raw(2), &mut ids, resize)
                .is_none()
        );
        assert_eq!(ids.peek(), Id::FIRST);
    }

    #[test]
    fn sentinels_pass_through() {
        let frame = frame();
        let mut manager = IframeManager::new();
        let mut ids = IdGenerator::new();
        let click = Event::incremental(
            IncrementalData::MouseInteraction(events::MouseInteractionData {
                kind: events::MouseInteraction::Click,
                id: Id::UNKNOWN,
                x: 0.0,
                y: 0.0,
            }),
            3,
        );
        let out = manager
            .transform_cross_origin_event(frame, Id::from_raw(2), &mut ids, click)
            .unwrap();
        let EventData::IncrementalSnapshot(IncrementalData::MouseInteraction(data)) = out.data else {
            panic!("expected interaction");
        };
        assert_eq!(data.id, Id::UNKNOWN);
    }

    #[test]
    fn drag_positions_are_remapped_and_logs_pass_through() {
        let frame = frame();
        let mut manager = IframeManager::new();
        let mut ids = IdGenerator::new();
        let drag = Event::incremental(
            IncrementalData::Drag(MouseMoveData {
                positions: vec![MousePosition {
                    x: 4.0,
                    y: 4.0,
                    id: Id::from_raw(8),
                    time_offset: -5,
                }],
            }),
            20,
        );
        let out = manager
            .transform_cross_origin_event(frame, Id::from_raw(2), &mut ids, drag)
            .unwrap();
        let EventData::IncrementalSnapshot(IncrementalData::Drag(data)) = out.data else {
            panic!("expected drag");
        };
        assert_eq!(data.positions[0].id, Id::FIRST);

        let log = Event::incremental(
            IncrementalData::Log(events::LogData {
                level: "info".into(),
                trace: Vec::new(),
                payload: vec!["\"ready\"".into()],
            }),
            21,
        );
        let out = manager
            .transform_cross_origin_event(frame, Id::from_raw(2), &mut ids, log.clone())
            .unwrap();
        assert_eq!(out, log);
    }
}
