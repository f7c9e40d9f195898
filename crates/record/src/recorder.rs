//! A capture session: one full snapshot, then incremental events.
//!
//! The host drives the recorder synchronously. It mutates the [`Document`]
//! and calls [`Recorder::flush`] at the end of every batch; everything else
//! it observes (pointer, scroll, input, media...) goes through the
//! `record_*` helpers. Events leave through the emit sink in the order they
//! are produced, stamped with the recorder's [`Clock`].

use crate::buffer::MutationBuffer;
use crate::canvas::{CanvasCall, CanvasRecorder};
use crate::iframe::IframeManager;
use crate::options::RecordOptions;
use core_types::{Clock, Id, IdGenerator, millis};
use dom::{Document, MutationRecord, NodeKey, NodeKind};
use events::{
    AttributeChange, AttributeMutation, CanvasContext, CustomData, Event, EventData, FontData,
    FullSnapshotData, IncrementalData, InitialOffset, InputData, MediaInteraction,
    MediaInteractionData, MetaData, MouseInteraction, MouseInteractionData, MouseMoveData,
    MousePosition, MutationData, PluginData, ScrollData, SelectionData, SelectionRange,
    SerializedNode, ViewportResizeData,
};
use snapshot::{
    Mirror, PendingLoads, SerializeContext, SerializeFlags, SerializeObserver, is_blocked,
    is_input_ignored, mask_input_value,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Receives every event together with its checkout flag.
pub type EmitFn = Box<dyn FnMut(Event, bool)>;

/// A pointer position reported by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub node: NodeKey,
    pub x: f64,
    pub y: f64,
    /// Clock time the position was observed at.
    pub at: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaState {
    pub current_time: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionSpan {
    pub start: NodeKey,
    pub start_offset: usize,
    pub end: NodeKey,
    pub end_offset: usize,
}

/// Collects what the serializer reports while a capture runs.
struct LoadTracker<'d> {
    doc: &'d Document,
    loads: Loads,
}

#[derive(Default)]
struct Loads {
    frames: Vec<NodeKey>,
    iframes: Vec<(NodeKey, SerializedNode)>,
    sheets: Vec<(NodeKey, SerializedNode)>,
}

impl SerializeObserver for LoadTracker<'_> {
    fn on_serialize(&mut self, node: NodeKey) {
        if self.doc.tag_name(node) == Some("iframe") {
            self.loads.frames.push(node);
        }
    }

    fn on_iframe_load(&mut self, frame: NodeKey, document: SerializedNode) {
        self.loads.iframes.push((frame, document));
    }

    fn on_stylesheet_load(&mut self, link: NodeKey, link_node: SerializedNode) {
        self.loads.sheets.push((link, link_node));
    }
}

pub struct Recorder<C: Clock> {
    options: RecordOptions,
    clock: C,
    emit: EmitFn,
    mirror: Mirror,
    ids: IdGenerator,
    pending: PendingLoads,
    buffers: Vec<MutationBuffer>,
    iframes: IframeManager,
    canvas: CanvasRecorder,
    last_inputs: HashMap<NodeKey, (String, bool)>,
    viewport: (u32, u32),
    incremental_count: usize,
    last_full_snapshot: Option<i64>,
    taking_snapshot: bool,
}

impl<C: Clock> Recorder<C> {
    pub fn new(options: RecordOptions, clock: C, emit: impl FnMut(Event, bool) + 'static) -> Self {
        let viewport = (options.width, options.height);
        Self {
            options,
            clock,
            emit: Box::new(emit),
            mirror: Mirror::new(),
            ids: IdGenerator::new(),
            pending: PendingLoads::new(),
            buffers: Vec::new(),
            iframes: IframeManager::new(),
            canvas: CanvasRecorder::new(),
            last_inputs: HashMap::new(),
            viewport,
            incremental_count: 0,
            last_full_snapshot: None,
            taking_snapshot: false,
        }
    }

    pub fn options(&self) -> &RecordOptions {
        &self.options
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Number of documents observed, the main one included.
    pub fn observed_documents(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_frozen(&self) -> bool {
        self.buffers.first().is_some_and(MutationBuffer::is_frozen)
    }

    /// Starts observing `doc` and emits `Meta` plus the first full snapshot.
    pub fn start(&mut self, doc: &mut Document) {
        doc.set_observing(true);
        self.buffers.clear();
        self.buffers.push(MutationBuffer::new(doc.root()));
        log::debug!(target: "record.session", "recording started");
        self.take_full_snapshot(doc, false);
    }

    /// Emits `Meta` and a fresh full snapshot. Buffers are locked meanwhile;
    /// changes not flushed yet are covered by the snapshot and dropped.
    pub fn take_full_snapshot(&mut self, doc: &mut Document, is_checkout: bool) {
        if self.buffers.is_empty() {
            self.buffers.push(MutationBuffer::new(doc.root()));
        }
        self.taking_snapshot = true;
        let meta = MetaData {
            href: self.options.href.clone(),
            width: self.viewport.0,
            height: self.viewport.1,
        };
        let timestamp = millis(&self.clock);
        self.wrapped_emit(doc, Event::new(EventData::Meta(meta), timestamp), is_checkout);

        let root = doc.root();
        self.buffers.retain(|buffer| buffer.root() == root);
        for buffer in &mut self.buffers {
            buffer.lock();
            buffer.reset();
        }
        doc.take_records();
        self.mirror.reset();
        self.pending.clear();
        self.canvas.reset();
        self.last_inputs.clear();

        let (node, loads) = self.capture(doc, |ctx, _| {
            let flags = SerializeFlags::full_tree(ctx.options);
            ctx.serialize_node_with_id(root, flags)
        });
        match node {
            Some(node) => {
                let initial_offset = document_scroll(doc);
                let full = FullSnapshotData {
                    node,
                    initial_offset,
                };
                let timestamp = millis(&self.clock);
                self.wrapped_emit(doc, Event::new(EventData::FullSnapshot(full), timestamp), is_checkout);
            }
            None => log::warn!(target: "record.session", "document could not be serialized"),
        }
        self.finish_loads(doc, loads);

        let (payloads, loads) = self.capture(doc, |ctx, buffers| {
            let payloads: Vec<_> = buffers.iter_mut().filter_map(|b| b.unlock(ctx)).collect();
            ctx.resolve_pending();
            payloads
        });
        self.taking_snapshot = false;
        for data in payloads {
            self.emit_mutation(doc, data);
        }
        self.finish_loads(doc, loads);
    }

    /// Processes every change queued on `doc` since the last flush and picks
    /// up frames and stylesheets that finished loading.
    pub fn flush(&mut self, doc: &mut Document) {
        let records = doc.take_records();
        let (payloads, loads) = self.capture(doc, |ctx, buffers| {
            let batches = route_records(ctx.doc, buffers, records);
            let mut payloads = Vec::new();
            for (buffer, batch) in buffers.iter_mut().zip(&batches) {
                if let Some(data) = buffer.process_mutations(ctx, batch) {
                    payloads.push(data);
                }
            }
            ctx.resolve_pending();
            payloads
        });
        for data in payloads {
            self.emit_mutation(doc, data);
        }
        self.finish_loads(doc, loads);
    }

    /// Stops emitting mutations until the next non-mutation event or an
    /// explicit [`Recorder::unfreeze`].
    pub fn freeze(&mut self) {
        for buffer in &mut self.buffers {
            buffer.freeze();
        }
    }

    pub fn unfreeze(&mut self, doc: &mut Document) {
        let records = doc.take_records();
        let (payloads, loads) = self.capture(doc, |ctx, buffers| {
            let batches = route_records(ctx.doc, buffers, records);
            for (buffer, batch) in buffers.iter_mut().zip(&batches) {
                buffer.process(ctx, batch);
            }
            buffers
                .iter_mut()
                .filter_map(|b| b.unfreeze(ctx))
                .collect::<Vec<_>>()
        });
        for data in payloads {
            self.emit_mutation(doc, data);
        }
        self.finish_loads(doc, loads);
    }

    /// Runs `f` with a serialization context over the session state.
    fn capture<R>(
        &mut self,
        doc: &Document,
        f: impl FnOnce(&mut SerializeContext<'_>, &mut Vec<MutationBuffer>) -> R,
    ) -> (R, Loads) {
        let now = self.clock.now();
        let mut tracker = LoadTracker {
            doc,
            loads: Loads::default(),
        };
        let result = {
            let mut ctx = SerializeContext::new(doc, &mut self.mirror, &mut self.ids, &self.options.serialize)
                .with_pending(&mut self.pending, now)
                .with_observer(&mut tracker);
            f(&mut ctx, &mut self.buffers)
        };
        (result, tracker.loads)
    }

    fn finish_loads(&mut self, doc: &mut Document, loads: Loads) {
        for frame in loads.frames {
            self.iframes.add_iframe(frame);
        }
        for (frame, document) in loads.iframes {
            if let Some(content) = doc.content_document(frame) {
                if !self.buffers.iter().any(|b| b.root() == content) {
                    self.buffers.push(MutationBuffer::new(content));
                }
            }
            let frame_id = self.mirror.get_id(frame);
            log::debug!(target: "record.session", "frame {frame} loaded, attaching under {frame_id}");
            let data = IframeManager::attach_iframe(frame_id, document);
            self.emit_mutation(doc, data);
        }
        for (_, link_node) in loads.sheets {
            let Some(attributes) = link_node.attributes() else {
                continue;
            };
            let attributes = attributes
                .iter()
                .map(|(name, value)| (name.clone(), AttributeChange::Value(Some(value.clone()))))
                .collect();
            let data = MutationData {
                attributes: vec![AttributeMutation {
                    id: link_node.id,
                    attributes,
                }],
                ..MutationData::default()
            };
            self.emit_mutation(doc, data);
        }
    }

    fn emit_mutation(&mut self, doc: &mut Document, data: MutationData) {
        self.emit_incremental(doc, IncrementalData::Mutation(data));
    }

    fn emit_incremental(&mut self, doc: &mut Document, data: IncrementalData) {
        let event = Event::incremental(data, millis(&self.clock));
        self.wrapped_emit(doc, event, false);
    }

    fn wrapped_emit(&mut self, doc: &mut Document, event: Event, is_checkout: bool) {
        if self.is_frozen() && !event.is_full_snapshot() && !event.is_mutation() {
            self.unfreeze(doc);
        }
        let timestamp = event.timestamp;
        let is_full = event.is_full_snapshot();
        let counts = event.is_incremental()
            && !matches!(
                &event.data,
                EventData::IncrementalSnapshot(IncrementalData::Mutation(m)) if m.is_attach_iframe
            );
        (self.emit)(event, is_checkout);

        if is_full {
            self.last_full_snapshot = Some(timestamp);
            self.incremental_count = 0;
            return;
        }
        if !counts || self.taking_snapshot {
            return;
        }
        self.incremental_count += 1;
        let exceed_count = self
            .options
            .checkout_every_nth
            .is_some_and(|n| n > 0 && self.incremental_count >= n);
        let exceed_time = match (self.options.checkout_every_nms, self.last_full_snapshot) {
            (Some(every), Some(last)) => {
                timestamp - last > i64::try_from(every.as_millis()).unwrap_or(i64::MAX)
            }
            _ => false,
        };
        if exceed_count || exceed_time {
            log::debug!(target: "record.session", "checkout after {} incremental events", self.incremental_count);
            self.take_full_snapshot(doc, true);
        }
    }

    /// Serialized id of `node` when it is recorded and not blocked.
    fn visible_id(&self, doc: &Document, node: NodeKey) -> Option<Id> {
        let id = self.mirror.get_id(node);
        if !self.mirror.has(id) || is_blocked(doc, node, &self.options.serialize, true) {
            return None;
        }
        Some(id)
    }

    pub fn record_mouse_move(&mut self, doc: &mut Document, samples: &[PointerSample]) {
        let now = self.clock.now();
        let positions: Vec<_> = samples
            .iter()
            .map(|sample| MousePosition {
                x: sample.x,
                y: sample.y,
                id: self.mirror.get_id(sample.node),
                time_offset: signed_millis(sample.at) - signed_millis(now),
            })
            .collect();
        if positions.is_empty() {
            return;
        }
        self.emit_incremental(doc, IncrementalData::MouseMove(MouseMoveData { positions }));
    }

    pub fn record_mouse_interaction(
        &mut self,
        doc: &mut Document,
        kind: MouseInteraction,
        node: NodeKey,
        x: f64,
        y: f64,
    ) {
        let Some(id) = self.visible_id(doc, node) else {
            return;
        };
        let data = MouseInteractionData { kind, id, x, y };
        self.emit_incremental(doc, IncrementalData::MouseInteraction(data));
    }

    /// Reports the current scroll offset of `node`. For a document the
    /// offset of its document element is used.
    pub fn record_scroll(&mut self, doc: &mut Document, node: NodeKey) {
        let Some(id) = self.visible_id(doc, node) else {
            return;
        };
        let offset = if doc.kind(node) == Some(NodeKind::Document) {
            document_scroll(doc)
        } else {
            let scroll = doc.element(node).map(|el| el.scroll).unwrap_or_default();
            InitialOffset {
                top: scroll.top,
                left: scroll.left,
            }
        };
        let data = ScrollData {
            id,
            x: offset.left,
            y: offset.top,
        };
        self.emit_incremental(doc, IncrementalData::Scroll(data));
    }

    pub fn record_viewport_resize(&mut self, doc: &mut Document, width: u32, height: u32) {
        self.viewport = (width, height);
        self.emit_incremental(doc, IncrementalData::ViewportResize(ViewportResizeData { width, height }));
    }

    /// Reports the current value of a form control. Values equal to the last
    /// reported one are skipped. Checking a radio button also reports the
    /// other buttons of its group as unchecked.
    pub fn record_input(&mut self, doc: &mut Document, node: NodeKey, user_triggered: bool) {
        let options = &self.options.serialize;
        let Some(el) = doc.element(node) else {
            return;
        };
        let tag = el.tag_name().to_string();
        if !matches!(tag.as_str(), "input" | "textarea" | "select") {
            return;
        }
        if is_input_ignored(doc, node, options) || self.visible_id(doc, node).is_none() {
            return;
        }
        let input_type = el.attribute("type").map(str::to_ascii_lowercase);
        let is_toggle = matches!(input_type.as_deref(), Some("radio" | "checkbox"));
        let value = el
            .value
            .clone()
            .or_else(|| match tag.as_str() {
                "textarea" => Some(doc.text_content(node)),
                _ => el.attribute("value").map(str::to_string),
            })
            .unwrap_or_default();
        let is_checked = is_toggle && el.checked.unwrap_or_else(|| el.attribute("checked").is_some());
        let text = if is_toggle {
            value
        } else {
            mask_input_value(&tag, input_type.as_deref(), &value, options)
        };
        let group = (input_type.as_deref() == Some("radio") && is_checked)
            .then(|| el.attribute("name").map(str::to_string))
            .flatten();

        self.emit_input(doc, node, text, is_checked, Some(user_triggered));

        if let Some(name) = group {
            let owner = doc.owner_root(node);
            let others: Vec<(NodeKey, String)> = doc
                .descendants(owner)
                .filter(|&other| other != node)
                .filter_map(|other| {
                    let el = doc.element(other)?;
                    let same_group = el.tag_name() == "input"
                        && el.attribute("type") == Some("radio")
                        && el.attribute("name") == Some(name.as_str());
                    same_group.then(|| (other, el.value.clone().or_else(|| el.attribute("value").map(str::to_string)).unwrap_or_default()))
                })
                .collect();
            for (other, value) in others {
                self.emit_input(doc, other, value, false, Some(false));
            }
        }
    }

    fn emit_input(
        &mut self,
        doc: &mut Document,
        node: NodeKey,
        text: String,
        is_checked: bool,
        user_triggered: Option<bool>,
    ) {
        let Some(id) = self.visible_id(doc, node) else {
            return;
        };
        let state = (text.clone(), is_checked);
        if self.last_inputs.get(&node) == Some(&state) {
            return;
        }
        self.last_inputs.insert(node, state);
        let data = InputData {
            id,
            text,
            is_checked,
            user_triggered,
        };
        self.emit_incremental(doc, IncrementalData::Input(data));
    }

    pub fn record_media_interaction(
        &mut self,
        doc: &mut Document,
        node: NodeKey,
        kind: MediaInteraction,
        state: MediaState,
    ) {
        let Some(id) = self.visible_id(doc, node) else {
            return;
        };
        let data = MediaInteractionData {
            kind,
            id,
            current_time: Some(state.current_time),
            volume: Some(state.volume),
            muted: Some(state.muted),
            playback_rate: Some(state.playback_rate),
        };
        self.emit_incremental(doc, IncrementalData::MediaInteraction(data));
    }

    /// Ranges touching a blocked or unrecorded node are left out.
    pub fn record_selection(&mut self, doc: &mut Document, spans: &[SelectionSpan]) {
        let ranges: Vec<_> = spans
            .iter()
            .filter_map(|span| {
                Some(SelectionRange {
                    start: self.visible_id(doc, span.start)?,
                    start_offset: span.start_offset,
                    end: self.visible_id(doc, span.end)?,
                    end_offset: span.end_offset,
                })
            })
            .collect();
        if ranges.is_empty() {
            return;
        }
        self.emit_incremental(doc, IncrementalData::Selection(SelectionData { ranges }));
    }

    pub fn record_font(
        &mut self,
        doc: &mut Document,
        family: &str,
        font_source: &str,
        buffer: bool,
        descriptors: BTreeMap<String, String>,
    ) {
        let data = FontData {
            family: family.to_string(),
            font_source: font_source.to_string(),
            buffer,
            descriptors,
        };
        self.emit_incremental(doc, IncrementalData::Font(data));
    }

    pub fn record_canvas(
        &mut self,
        doc: &mut Document,
        canvas: NodeKey,
        context: CanvasContext,
        calls: &[CanvasCall],
    ) {
        let data = self.canvas.record(
            doc,
            &self.mirror,
            &self.options.serialize,
            canvas,
            context,
            calls,
        );
        if let Some(data) = data {
            self.emit_incremental(doc, IncrementalData::CanvasMutation(data));
        }
    }

    pub fn record_custom(&mut self, doc: &mut Document, tag: &str, payload: serde_json::Value) {
        let data = CustomData {
            tag: tag.to_string(),
            payload,
        };
        let event = Event::new(EventData::Custom(data), millis(&self.clock));
        self.wrapped_emit(doc, event, false);
    }

    pub fn record_plugin(&mut self, doc: &mut Document, plugin: &str, payload: serde_json::Value) {
        let data = PluginData {
            plugin: plugin.to_string(),
            payload,
        };
        let event = Event::new(EventData::Plugin(data), millis(&self.clock));
        self.wrapped_emit(doc, event, false);
    }

    /// Accepts an event recorded inside the cross-origin `frame` and emits
    /// it translated into this session's ids.
    pub fn record_cross_origin_event(
        &mut self,
        doc: &mut Document,
        frame: NodeKey,
        event: Event,
        is_checkout: bool,
    ) {
        let frame_id = self.mirror.get_id(frame);
        if !self.mirror.has(frame_id) {
            log::debug!(target: "record.iframe", "event from unrecorded frame {frame}, dropping it");
            return;
        }
        if let Some(event) = self
            .iframes
            .transform_cross_origin_event(frame, frame_id, &mut self.ids, event)
        {
            self.wrapped_emit(doc, event, is_checkout);
        }
    }
}

/// Splits one drained batch by the observed document each record belongs to.
fn route_records(
    doc: &Document,
    buffers: &[MutationBuffer],
    records: Vec<MutationRecord>,
) -> Vec<Vec<MutationRecord>> {
    let mut batches: Vec<Vec<MutationRecord>> = buffers.iter().map(|_| Vec::new()).collect();
    for record in records {
        let root = doc.owner_root(record.target());
        match buffers.iter().position(|b| b.root() == root) {
            Some(index) => batches[index].push(record),
            None => log::trace!(target: "record.mutation", "record outside observed documents: {record:?}"),
        }
    }
    batches
}

fn document_scroll(doc: &Document) -> InitialOffset {
    let scroll = doc
        .children(doc.root())
        .iter()
        .find_map(|&child| doc.element(child))
        .map(|el| el.scroll)
        .unwrap_or_default();
    InitialOffset {
        top: scroll.top,
        left: scroll.left,
    }
}

fn signed_millis(at: Duration) -> i64 {
    i64::try_from(at.as_millis()).unwrap_or(i64::MAX)
}
