//! Canvas drawing calls reported by the host, encoded per canvas.

use dom::{Document, NodeKey};
use events::{CanvasCommand, CanvasContext, CanvasMutationData, HandleRegistry, HostValue};
use snapshot::{Mirror, SerializeOptions, is_blocked};
use std::collections::HashMap;

/// One call or property assignment on a rendering context.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasCall {
    pub property: String,
    pub args: Vec<HostValue>,
    pub setter: bool,
}

impl CanvasCall {
    pub fn method(property: impl Into<String>, args: Vec<HostValue>) -> Self {
        Self {
            property: property.into(),
            args,
            setter: false,
        }
    }

    pub fn setter(property: impl Into<String>, value: HostValue) -> Self {
        Self {
            property: property.into(),
            args: vec![value],
            setter: true,
        }
    }
}

/// Handle tables per canvas, so handle indices restart for every canvas.
#[derive(Debug, Default)]
pub struct CanvasRecorder {
    handles: HashMap<NodeKey, HandleRegistry>,
}

impl CanvasRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `calls` made on `canvas`. `None` when the canvas is blocked,
    /// not serialized, or nothing was drawn.
    pub fn record(
        &mut self,
        doc: &Document,
        mirror: &Mirror,
        options: &SerializeOptions,
        canvas: NodeKey,
        context: CanvasContext,
        calls: &[CanvasCall],
    ) -> Option<CanvasMutationData> {
        if calls.is_empty() || !options.record_canvas {
            return None;
        }
        if doc.tag_name(canvas) != Some("canvas") || is_blocked(doc, canvas, options, true) {
            return None;
        }
        let id = mirror.get_id(canvas);
        if !mirror.has(id) {
            log::debug!(target: "record.canvas", "canvas {canvas} is not serialized, dropping {} calls", calls.len());
            return None;
        }
        let handles = self.handles.entry(canvas).or_default();
        let commands = calls
            .iter()
            .map(|call| CanvasCommand {
                property: call.property.clone(),
                args: call.args.iter().map(|arg| arg.encode(handles)).collect(),
                setter: call.setter,
            })
            .collect();
        Some(CanvasMutationData {
            id,
            context,
            commands,
        })
    }

    /// Forgets every handle table; used when a new full snapshot starts.
    pub fn reset(&mut self) {
        self.handles.clear();
    }
}
