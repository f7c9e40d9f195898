//! Live document model observed by the recorder and rebuilt by the replayer.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeKey`]. Keys are never reused: a removed node stays in the arena,
//! detached, so a key held by the caller keeps pointing at the same node.
//! Structural, attribute and text changes made through the document are
//! queued as [`MutationRecord`]s until drained with
//! [`Document::take_records`].

pub mod debug;
mod document;
#[cfg(feature = "dom-snapshot")]
pub mod dom_snapshot;
mod error;
pub mod markup;
mod mutation;
mod types;

pub use document::{Descendants, Document};
pub use error::DomError;
pub use markup::{parse_document, parse_into};
pub use mutation::MutationRecord;
pub use types::{ElementData, Namespace, NodeData, NodeKey, NodeKind, Rect, ScrollOffset};
