//! Canvas drawing commands and their argument encoding.
//!
//! Host values that are not plain JSON (typed arrays, raw buffers, images,
//! and opaque context handles) are carried as tagged objects. Handles are
//! encoded as a per-kind index assigned in first-seen order, so the replay
//! side can rebuild the same table of objects by creation order.
use crate::EventsError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanvasContext {
    TwoD,
    WebGl,
    WebGl2,
}

numeric_enum!(CanvasContext {
    TwoD = 0,
    WebGl = 1,
    WebGl2 = 2,
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypedArrayKind {
    Int8Array,
    Uint8Array,
    Uint8ClampedArray,
    Int16Array,
    Uint16Array,
    Int32Array,
    Uint32Array,
    Float32Array,
    Float64Array,
}

/// A value as the host handed it to a drawing call.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<HostValue>),
    TypedArray {
        kind: TypedArrayKind,
        values: Vec<f64>,
    },
    ArrayBuffer(Vec<u8>),
    DataView {
        buffer: Vec<u8>,
        byte_offset: usize,
        byte_length: usize,
    },
    ImageData {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
    /// An image element, referenced by its source.
    Image {
        src: String,
    },
    /// Another canvas used as an image source, captured as a data URL.
    Canvas {
        data_url: String,
    },
    /// An opaque context object (program, texture, buffer...). `object`
    /// identifies it on the host side; after decoding it is the per-kind
    /// creation index.
    Handle {
        kind: String,
        object: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rr_type")]
pub enum TaggedArg {
    #[serde(rename_all = "camelCase")]
    TypedArray {
        kind: TypedArrayKind,
        values: Vec<f64>,
    },
    #[serde(rename_all = "camelCase")]
    ArrayBuffer { base64: String },
    #[serde(rename_all = "camelCase")]
    DataView {
        base64: String,
        byte_offset: usize,
        byte_length: usize,
    },
    #[serde(rename_all = "camelCase")]
    ImageData {
        base64: String,
        width: u32,
        height: u32,
    },
    #[serde(rename = "HTMLImageElement")]
    Image { src: String },
    #[serde(rename_all = "camelCase")]
    Handle { kind: String, index: usize },
}

/// Encoded argument of a drawing call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanvasArg {
    List(Vec<CanvasArg>),
    Tagged(TaggedArg),
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasCommand {
    pub property: String,
    pub args: Vec<CanvasArg>,
    /// Property assignment rather than a method call.
    #[serde(default)]
    pub setter: bool,
}

/// Per-kind table of handles seen so far, indexed in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct HandleRegistry {
    tables: HashMap<String, Vec<u64>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `object` within its kind, registering it when first seen.
    pub fn index_of(&mut self, kind: &str, object: u64) -> usize {
        let table = self.tables.entry(kind.to_string()).or_default();
        match table.iter().position(|&o| o == object) {
            Some(index) => index,
            None => {
                table.push(object);
                table.len() - 1
            }
        }
    }

    pub fn reset(&mut self) {
        self.tables.clear();
    }
}

impl HostValue {
    pub fn encode(&self, handles: &mut HandleRegistry) -> CanvasArg {
        match self {
            HostValue::Null => CanvasArg::Null,
            HostValue::Bool(b) => CanvasArg::Bool(*b),
            HostValue::Number(n) => CanvasArg::Number(*n),
            HostValue::Text(s) => CanvasArg::Text(s.clone()),
            HostValue::List(items) => {
                CanvasArg::List(items.iter().map(|v| v.encode(handles)).collect())
            }
            HostValue::TypedArray { kind, values } => CanvasArg::Tagged(TaggedArg::TypedArray {
                kind: *kind,
                values: values.clone(),
            }),
            HostValue::ArrayBuffer(bytes) => CanvasArg::Tagged(TaggedArg::ArrayBuffer {
                base64: STANDARD.encode(bytes),
            }),
            HostValue::DataView {
                buffer,
                byte_offset,
                byte_length,
            } => CanvasArg::Tagged(TaggedArg::DataView {
                base64: STANDARD.encode(buffer),
                byte_offset: *byte_offset,
                byte_length: *byte_length,
            }),
            HostValue::ImageData {
                data,
                width,
                height,
            } => CanvasArg::Tagged(TaggedArg::ImageData {
                base64: STANDARD.encode(data),
                width: *width,
                height: *height,
            }),
            HostValue::Image { src } => CanvasArg::Tagged(TaggedArg::Image { src: src.clone() }),
            HostValue::Canvas { data_url } => CanvasArg::Tagged(TaggedArg::Image {
                src: data_url.clone(),
            }),
            HostValue::Handle { kind, object } => CanvasArg::Tagged(TaggedArg::Handle {
                kind: kind.clone(),
                index: handles.index_of(kind, *object),
            }),
        }
    }

    /// Inverse of [`HostValue::encode`]. Canvases come back as images and
    /// handles carry their creation index.
    pub fn decode(arg: &CanvasArg) -> Result<HostValue, EventsError> {
        Ok(match arg {
            CanvasArg::Null => HostValue::Null,
            CanvasArg::Bool(b) => HostValue::Bool(*b),
            CanvasArg::Number(n) => HostValue::Number(*n),
            CanvasArg::Text(s) => HostValue::Text(s.clone()),
            CanvasArg::List(items) => HostValue::List(
                items
                    .iter()
                    .map(HostValue::decode)
                    .collect::<Result<_, _>>()?,
            ),
            CanvasArg::Tagged(TaggedArg::TypedArray { kind, values }) => HostValue::TypedArray {
                kind: *kind,
                values: values.clone(),
            },
            CanvasArg::Tagged(TaggedArg::ArrayBuffer { base64 }) => {
                HostValue::ArrayBuffer(STANDARD.decode(base64)?)
            }
            CanvasArg::Tagged(TaggedArg::DataView {
                base64,
                byte_offset,
                byte_length,
            }) => HostValue::DataView {
                buffer: STANDARD.decode(base64)?,
                byte_offset: *byte_offset,
                byte_length: *byte_length,
            },
            CanvasArg::Tagged(TaggedArg::ImageData {
                base64,
                width,
                height,
            }) => {
                let data = STANDARD.decode(base64)?;
                let expected = (*width as usize) * (*height as usize) * 4;
                if data.len() != expected {
                    return Err(EventsError::ImageDataSize {
                        width: *width,
                        height: *height,
                        expected,
                        actual: data.len(),
                    });
                }
                HostValue::ImageData {
                    data,
                    width: *width,
                    height: *height,
                }
            }
            CanvasArg::Tagged(TaggedArg::Image { src }) => HostValue::Image { src: src.clone() },
            CanvasArg::Tagged(TaggedArg::Handle { kind, index }) => HostValue::Handle {
                kind: kind.clone(),
                object: *index as u64,
            },
        })
    }
}
