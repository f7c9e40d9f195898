//! Replay state that lives outside the document tree.

use core_types::Id;
use events::{
    CanvasCommand, CanvasContext, CanvasMutationData, FontData, HostValue, MediaInteraction,
    MediaInteractionData, MetaData, MouseInteraction, MouseInteractionData, MouseMoveData,
    SelectionRange,
};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
    /// Node under the pointer.
    pub target: Id,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interaction {
    pub kind: MouseInteraction,
    pub target: Id,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaState {
    pub paused: bool,
    pub current_time: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            paused: true,
            current_time: 0.0,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
        }
    }
}

/// A drawing call with its arguments decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub property: String,
    pub args: Vec<HostValue>,
    pub setter: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CanvasLog {
    pub context: CanvasContext,
    pub calls: Vec<DrawCall>,
}

#[derive(Clone, Debug, Default)]
pub struct ReplayState {
    pub href: Option<String>,
    pub viewport: Viewport,
    pub pointer: Option<Pointer>,
    pub last_interaction: Option<Interaction>,
    /// Element with focus, from the last focus/blur interaction.
    pub focused: Option<Id>,
    pub media: HashMap<Id, MediaState>,
    pub selection: Vec<SelectionRange>,
    pub canvas: HashMap<Id, CanvasLog>,
    pub fonts: Vec<FontData>,
    /// Timestamp of the most recently applied event.
    pub last_timestamp: Option<i64>,
}

impl ReplayState {
    /// Forgets everything tied to node ids of the previous tree.
    pub fn reset_for_snapshot(&mut self) {
        self.pointer = None;
        self.last_interaction = None;
        self.focused = None;
        self.media.clear();
        self.selection.clear();
        self.canvas.clear();
    }

    pub fn apply_meta(&mut self, meta: &MetaData) {
        self.href = Some(meta.href.clone());
        self.viewport = Viewport {
            width: meta.width,
            height: meta.height,
        };
    }

    pub fn apply_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Viewport { width, height };
    }

    /// Only the latest sampled position is kept.
    pub fn apply_mouse_move(&mut self, data: &MouseMoveData) {
        if let Some(last) = data.positions.iter().max_by_key(|p| p.time_offset) {
            self.pointer = Some(Pointer {
                x: last.x,
                y: last.y,
                target: last.id,
            });
        }
    }

    pub fn apply_interaction(&mut self, data: &MouseInteractionData) {
        match data.kind {
            MouseInteraction::Focus => self.focused = Some(data.id),
            MouseInteraction::Blur if self.focused == Some(data.id) => self.focused = None,
            MouseInteraction::Focus | MouseInteraction::Blur => {}
            _ => {
                self.pointer = Some(Pointer {
                    x: data.x,
                    y: data.y,
                    target: data.id,
                });
            }
        }
        self.last_interaction = Some(Interaction {
            kind: data.kind,
            target: data.id,
            x: data.x,
            y: data.y,
        });
    }

    pub fn apply_media(&mut self, data: &MediaInteractionData) {
        let media = self.media.entry(data.id).or_default();
        match data.kind {
            MediaInteraction::Play => media.paused = false,
            MediaInteraction::Pause => media.paused = true,
            MediaInteraction::Seeked | MediaInteraction::VolumeChange | MediaInteraction::RateChange => {}
        }
        if let Some(time) = data.current_time {
            media.current_time = time;
        }
        if let Some(volume) = data.volume {
            media.volume = volume;
        }
        if let Some(muted) = data.muted {
            media.muted = muted;
        }
        if let Some(rate) = data.playback_rate {
            media.playback_rate = rate;
        }
    }

    pub fn apply_selection(&mut self, ranges: &[SelectionRange]) {
        self.selection = ranges.to_vec();
    }

    pub fn apply_font(&mut self, font: &FontData) {
        self.fonts.push(font.clone());
    }

    /// Appends the decoded calls to the canvas log. Calls whose arguments do
    /// not decode are dropped one by one.
    pub fn apply_canvas(&mut self, data: &CanvasMutationData) {
        let log = self.canvas.entry(data.id).or_insert_with(|| CanvasLog {
            context: data.context,
            calls: Vec::new(),
        });
        log.context = data.context;
        log.calls
            .extend(data.commands.iter().filter_map(|command| decode_call(data.id, command)));
    }
}

fn decode_call(canvas: Id, command: &CanvasCommand) -> Option<DrawCall> {
    let args = command
        .args
        .iter()
        .map(HostValue::decode)
        .collect::<Result<Vec<_>, _>>();
    match args {
        Ok(args) => Some(DrawCall {
            property: command.property.clone(),
            args,
            setter: command.setter,
        }),
        Err(err) => {
            log::warn!(target: "replay.canvas", "dropping {} on canvas {canvas}: {err}", command.property);
            None
        }
    }
}
