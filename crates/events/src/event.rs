use crate::EventsError;
use crate::canvas::{CanvasCommand, CanvasContext};
use crate::mutation::MutationData;
use crate::node::SerializedNode;
use core_types::Id;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, from_value};
use std::collections::BTreeMap;

/// One entry of a recorded session, written as
/// `{"type": <code>, "data": {...}, "timestamp": <ms>}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub data: EventData,
    /// Milliseconds on the recorder's clock.
    pub timestamp: i64,
}

impl Event {
    pub fn new(data: EventData, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    pub fn incremental(data: IncrementalData, timestamp: i64) -> Self {
        Self::new(EventData::IncrementalSnapshot(data), timestamp)
    }

    pub fn is_full_snapshot(&self) -> bool {
        matches!(self.data, EventData::FullSnapshot(_))
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self.data, EventData::IncrementalSnapshot(_))
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self.data,
            EventData::IncrementalSnapshot(IncrementalData::Mutation(_))
        )
    }

    /// Pointer, scroll, resize and input activity: the events that end an
    /// inactive stretch.
    pub fn is_user_interaction(&self) -> bool {
        matches!(
            self.data,
            EventData::IncrementalSnapshot(
                IncrementalData::MouseMove(_)
                    | IncrementalData::MouseInteraction(_)
                    | IncrementalData::Scroll(_)
                    | IncrementalData::ViewportResize(_)
                    | IncrementalData::Input(_)
            )
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventData {
    DomContentLoaded {},
    Load {},
    FullSnapshot(FullSnapshotData),
    IncrementalSnapshot(IncrementalData),
    Meta(MetaData),
    Custom(CustomData),
    Plugin(PluginData),
}

impl EventData {
    pub fn name(&self) -> &'static str {
        match self {
            EventData::DomContentLoaded {} => "DomContentLoaded",
            EventData::Load {} => "Load",
            EventData::FullSnapshot(_) => "FullSnapshot",
            EventData::IncrementalSnapshot(data) => data.source_name(),
            EventData::Meta(_) => "Meta",
            EventData::Custom(_) => "Custom",
            EventData::Plugin(_) => "Plugin",
        }
    }

    /// The numeric `type` written on the wire.
    pub fn code(&self) -> u8 {
        match self {
            EventData::DomContentLoaded {} => 0,
            EventData::Load {} => 1,
            EventData::FullSnapshot(_) => 2,
            EventData::IncrementalSnapshot(_) => 3,
            EventData::Meta(_) => 4,
            EventData::Custom(_) => 5,
            EventData::Plugin(_) => 6,
        }
    }

    fn from_parts(code: u8, data: Value) -> Result<Self, serde_json::Error> {
        match code {
            0 => Ok(EventData::DomContentLoaded {}),
            1 => Ok(EventData::Load {}),
            2 => from_value(data).map(EventData::FullSnapshot),
            3 => from_value(data).map(EventData::IncrementalSnapshot),
            4 => from_value(data).map(EventData::Meta),
            5 => from_value(data).map(EventData::Custom),
            6 => from_value(data).map(EventData::Plugin),
            other => Err(de::Error::custom(format_args!("unknown event type {other}"))),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    #[serde(rename = "type")]
    code: u8,
    data: &'a T,
    timestamp: i64,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    code: u8,
    #[serde(default)]
    data: Value,
    timestamp: i64,
}

#[derive(Serialize)]
struct Empty {}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let code = self.data.code();
        let timestamp = self.timestamp;
        match &self.data {
            EventData::DomContentLoaded {} | EventData::Load {} => Envelope {
                code,
                data: &Empty {},
                timestamp,
            }
            .serialize(serializer),
            EventData::FullSnapshot(data) => Envelope { code, data, timestamp }.serialize(serializer),
            EventData::IncrementalSnapshot(data) => Envelope { code, data, timestamp }.serialize(serializer),
            EventData::Meta(data) => Envelope { code, data, timestamp }.serialize(serializer),
            EventData::Custom(data) => Envelope { code, data, timestamp }.serialize(serializer),
            EventData::Plugin(data) => Envelope { code, data, timestamp }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEnvelope::deserialize(deserializer)?;
        let data = EventData::from_parts(raw.code, raw.data).map_err(<D::Error as de::Error>::custom)?;
        Ok(Event::new(data, raw.timestamp))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    pub href: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialOffset {
    pub top: f64,
    pub left: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSnapshotData {
    pub node: SerializedNode,
    #[serde(default)]
    pub initial_offset: InitialOffset,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomData {
    pub tag: String,
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginData {
    pub plugin: String,
    pub payload: serde_json::Value,
}

/// Payload of an incremental snapshot. The numeric `source` is written
/// inline with the payload's own fields.
#[derive(Clone, Debug, PartialEq)]
pub enum IncrementalData {
    Mutation(MutationData),
    MouseMove(MouseMoveData),
    MouseInteraction(MouseInteractionData),
    Scroll(ScrollData),
    ViewportResize(ViewportResizeData),
    Input(InputData),
    /// Pointer positions from touch input. Replays like a mouse move.
    TouchMove(MouseMoveData),
    MediaInteraction(MediaInteractionData),
    StyleSheetRule(StyleSheetRuleData),
    CanvasMutation(CanvasMutationData),
    Font(FontData),
    Log(LogData),
    /// Pointer positions during a drag. Replays like a mouse move.
    Drag(MouseMoveData),
    StyleDeclaration(StyleDeclarationData),
    Selection(SelectionData),
    AdoptedStyleSheet(AdoptedStyleSheetData),
}

impl IncrementalData {
    pub fn source_name(&self) -> &'static str {
        match self {
            IncrementalData::Mutation(_) => "Mutation",
            IncrementalData::MouseMove(_) => "MouseMove",
            IncrementalData::MouseInteraction(_) => "MouseInteraction",
            IncrementalData::Scroll(_) => "Scroll",
            IncrementalData::ViewportResize(_) => "ViewportResize",
            IncrementalData::Input(_) => "Input",
            IncrementalData::MediaInteraction(_) => "MediaInteraction",
            IncrementalData::StyleSheetRule(_) => "StyleSheetRule",
            IncrementalData::StyleDeclaration(_) => "StyleDeclaration",
            IncrementalData::CanvasMutation(_) => "CanvasMutation",
            IncrementalData::Font(_) => "Font",
            IncrementalData::Selection(_) => "Selection",
            IncrementalData::AdoptedStyleSheet(_) => "AdoptedStyleSheet",
            IncrementalData::TouchMove(_) => "TouchMove",
            IncrementalData::Log(_) => "Log",
            IncrementalData::Drag(_) => "Drag",
        }
    }

    /// The numeric `source` written on the wire.
    pub fn code(&self) -> u8 {
        match self {
            IncrementalData::Mutation(_) => 0,
            IncrementalData::MouseMove(_) => 1,
            IncrementalData::MouseInteraction(_) => 2,
            IncrementalData::Scroll(_) => 3,
            IncrementalData::ViewportResize(_) => 4,
            IncrementalData::Input(_) => 5,
            IncrementalData::TouchMove(_) => 6,
            IncrementalData::MediaInteraction(_) => 7,
            IncrementalData::StyleSheetRule(_) => 8,
            IncrementalData::CanvasMutation(_) => 9,
            IncrementalData::Font(_) => 10,
            IncrementalData::Log(_) => 11,
            IncrementalData::Drag(_) => 12,
            IncrementalData::StyleDeclaration(_) => 13,
            IncrementalData::Selection(_) => 14,
            IncrementalData::AdoptedStyleSheet(_) => 15,
        }
    }

    fn from_parts(source: u64, data: Value) -> Result<Self, serde_json::Error> {
        match source {
            0 => from_value(data).map(IncrementalData::Mutation),
            1 => from_value(data).map(IncrementalData::MouseMove),
            2 => from_value(data).map(IncrementalData::MouseInteraction),
            3 => from_value(data).map(IncrementalData::Scroll),
            4 => from_value(data).map(IncrementalData::ViewportResize),
            5 => from_value(data).map(IncrementalData::Input),
            6 => from_value(data).map(IncrementalData::TouchMove),
            7 => from_value(data).map(IncrementalData::MediaInteraction),
            8 => from_value(data).map(IncrementalData::StyleSheetRule),
            9 => from_value(data).map(IncrementalData::CanvasMutation),
            10 => from_value(data).map(IncrementalData::Font),
            11 => from_value(data).map(IncrementalData::Log),
            12 => from_value(data).map(IncrementalData::Drag),
            13 => from_value(data).map(IncrementalData::StyleDeclaration),
            14 => from_value(data).map(IncrementalData::Selection),
            15 => from_value(data).map(IncrementalData::AdoptedStyleSheet),
            other => Err(de::Error::custom(format_args!("unknown incremental source {other}"))),
        }
    }
}

#[derive(Serialize)]
struct Sourced<'a, T> {
    source: u8,
    #[serde(flatten)]
    data: &'a T,
}

impl Serialize for IncrementalData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let source = self.code();
        match self {
            IncrementalData::Mutation(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::MouseMove(data)
            | IncrementalData::TouchMove(data)
            | IncrementalData::Drag(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::MouseInteraction(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::Scroll(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::ViewportResize(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::Input(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::MediaInteraction(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::StyleSheetRule(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::CanvasMutation(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::Font(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::Log(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::StyleDeclaration(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::Selection(data) => Sourced { source, data }.serialize(serializer),
            IncrementalData::AdoptedStyleSheet(data) => Sourced { source, data }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for IncrementalData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let source = fields
            .remove("source")
            .and_then(|source| source.as_u64())
            .ok_or_else(|| <D::Error as de::Error>::missing_field("source"))?;
        IncrementalData::from_parts(source, Value::Object(fields)).map_err(de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MousePosition {
    pub x: f64,
    pub y: f64,
    pub id: Id,
    /// Milliseconds relative to the enclosing event's timestamp (negative).
    pub time_offset: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseMoveData {
    pub positions: Vec<MousePosition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseInteraction {
    MouseUp,
    MouseDown,
    Click,
    ContextMenu,
    DblClick,
    Focus,
    Blur,
    TouchStart,
    /// A touch moved off its starting element.
    TouchMoveDeparted,
    TouchEnd,
    TouchCancel,
}

numeric_enum!(MouseInteraction {
    MouseUp = 0,
    MouseDown = 1,
    Click = 2,
    ContextMenu = 3,
    DblClick = 4,
    Focus = 5,
    Blur = 6,
    TouchStart = 7,
    TouchMoveDeparted = 8,
    TouchEnd = 9,
    TouchCancel = 10,
});

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseInteractionData {
    #[serde(rename = "type")]
    pub kind: MouseInteraction,
    pub id: Id,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollData {
    pub id: Id,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportResizeData {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputData {
    pub id: Id,
    pub text: String,
    pub is_checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_triggered: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaInteraction {
    Play,
    Pause,
    Seeked,
    VolumeChange,
    RateChange,
}

numeric_enum!(MediaInteraction {
    Play = 0,
    Pause = 1,
    Seeked = 2,
    VolumeChange = 3,
    RateChange = 4,
});

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInteractionData {
    #[serde(rename = "type")]
    pub kind: MediaInteraction,
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRuleAdd {
    pub rule: String,
    /// Position path into nested rule lists; `None` appends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<usize>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRuleRemove {
    pub index: Vec<usize>,
}

/// Rule insertions and deletions on a sheet addressed either by the owning
/// node's id or by a constructed-sheet style id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSheetRuleData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adds: Vec<StyleRuleAdd>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removes: Vec<StyleRuleRemove>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDeclarationSet {
    pub property: String,
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDeclarationRemove {
    pub property: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDeclarationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<i64>,
    pub index: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<StyleDeclarationSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<StyleDeclarationRemove>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasMutationData {
    pub id: Id,
    #[serde(rename = "type")]
    pub context: CanvasContext,
    pub commands: Vec<CanvasCommand>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontData {
    pub family: String,
    pub font_source: String,
    /// `font_source` holds encoded binary data rather than a URL.
    pub buffer: bool,
    #[serde(default)]
    pub descriptors: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRange {
    pub start: Id,
    pub start_offset: usize,
    pub end: Id,
    pub end_offset: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionData {
    pub ranges: Vec<SelectionRange>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptedStyles {
    pub style_id: i64,
    pub rules: Vec<StyleRuleAdd>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptedStyleSheetData {
    /// Id of the document or shadow host adopting the sheets.
    pub id: Id,
    pub style_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<AdoptedStyles>,
}

/// A console message captured by a logging hook.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogData {
    pub level: String,
    #[serde(default)]
    pub trace: Vec<String>,
    #[serde(default)]
    pub payload: Vec<String>,
}

/// A recorded session as stored on disk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub events: Vec<Event>,
}

impl Session {
    pub fn from_json(input: &str) -> Result<Self, EventsError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_slice(input: &[u8]) -> Result<Self, EventsError> {
        Ok(serde_json::from_slice(input)?)
    }

    pub fn to_json(&self) -> Result<String, EventsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, EventsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_wire_shape() {
        let event = Event::incremental(
            IncrementalData::Scroll(ScrollData {
                id: Id::from_raw(9),
                x: 0.0,
                y: 120.0,
            }),
            1_000,
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": 3,
                "data": {"source": 3, "id": 9, "x": 0.0, "y": 120.0},
                "timestamp": 1000
            })
        );
        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
        assert!(back.is_user_interaction());
    }

    #[test]
    fn unit_like_events_carry_empty_data() {
        let value = serde_json::to_value(Event::new(EventData::Load {}, 5)).unwrap();
        assert_eq!(value, json!({"type": 1, "data": {}, "timestamp": 5}));
    }

    #[test]
    fn session_parses_meta_and_snapshot() {
        let input = r#"{"events": [
            {"type": 4, "data": {"href": "https://a.test/", "width": 800, "height": 600}, "timestamp": 1},
            {"type": 2, "data": {"node": {"id": 1, "type": 0, "childNodes": []},
             "initialOffset": {"top": 0, "left": 0}}, "timestamp": 2}
        ]}"#;
        let session = Session::from_json(input).unwrap();
        assert_eq!(session.events.len(), 2);
        assert!(session.events[1].is_full_snapshot());
        assert_eq!(session.events[0].data.name(), "Meta");
        assert!(Session::from_json("{").is_err());
    }

    #[test]
    fn numeric_session_decodes_every_kind() {
        let input = r#"{"events": [
            {"type": 0, "data": {}, "timestamp": 1},
            {"type": 4, "data": {"href": "https://a.test/", "width": 1280, "height": 720}, "timestamp": 1},
            {"type": 2, "data": {"node": {"type": 0, "id": 1, "childNodes": [
                {"type": 1, "name": "html", "publicId": "", "systemId": "", "id": 2},
                {"type": 2, "tagName": "html", "attributes": {}, "id": 3, "childNodes": [
                    {"type": 5, "textContent": "c", "id": 4}
                ]}
            ]}, "initialOffset": {"top": 0, "left": 0}}, "timestamp": 2},
            {"type": 3, "data": {"source": 0, "texts": [], "attributes": [], "removes": [],
             "adds": [{"parentId": 3, "nextId": null, "node": {"type": 3, "textContent": "x", "id": 5}}]},
             "timestamp": 3},
            {"type": 3, "data": {"source": 2, "type": 2, "id": 3, "x": 4, "y": 5}, "timestamp": 4},
            {"type": 3, "data": {"source": 12, "positions": [{"x": 1, "y": 2, "id": 3, "timeOffset": -10}]},
             "timestamp": 5},
            {"type": 3, "data": {"source": 7, "type": 1, "id": 3, "currentTime": 2.5}, "timestamp": 6},
            {"type": 3, "data": {"source": 11, "level": "warn", "payload": ["\"late\""]}, "timestamp": 7},
            {"type": 5, "data": {"tag": "mark", "payload": {"n": 1}}, "timestamp": 8},
            {"type": 1, "timestamp": 9}
        ]}"#;
        let session = Session::from_json(input).unwrap();
        let names: Vec<&str> = session.events.iter().map(|e| e.data.name()).collect();
        assert_eq!(
            names,
            vec![
                "DomContentLoaded",
                "Meta",
                "FullSnapshot",
                "Mutation",
                "MouseInteraction",
                "Drag",
                "MediaInteraction",
                "Log",
                "Custom",
                "Load"
            ]
        );
        let EventData::IncrementalSnapshot(IncrementalData::MouseInteraction(click)) = &session.events[4].data else {
            panic!("expected a mouse interaction");
        };
        assert_eq!(click.kind, MouseInteraction::Click);
        let EventData::IncrementalSnapshot(IncrementalData::MediaInteraction(media)) = &session.events[6].data else {
            panic!("expected a media interaction");
        };
        assert_eq!(media.kind, MediaInteraction::Pause);

        let again = Session::from_json(&session.to_json().unwrap()).unwrap();
        assert_eq!(again, session);
    }

    #[test]
    fn unknown_codes_fail_to_decode() {
        let event = |json: &str| serde_json::from_str::<Event>(json);
        assert!(event(r#"{"type": 7, "data": {}, "timestamp": 1}"#).is_err());
        assert!(event(r#"{"type": 3, "data": {"source": 16}, "timestamp": 1}"#).is_err());
        assert!(event(r#"{"type": 3, "data": {"id": 1}, "timestamp": 1}"#).is_err());
        assert!(event(r#"{"type": "Load", "data": {}, "timestamp": 1}"#).is_err());
        assert!(event(r#"{"type": 3, "data": {"source": 2, "type": 11, "id": 1}, "timestamp": 1}"#).is_err());
    }
}
