//! Wire types exchanged between the recorder and the replayer.
//!
//! Everything here serializes to JSON with camelCase field names. Node
//! identity is carried exclusively by [`core_types::Id`].

#[macro_use]
mod codes;
pub mod canvas;
mod error;
mod event;
mod mutation;
mod node;

pub use canvas::{CanvasArg, CanvasCommand, CanvasContext, HandleRegistry, HostValue, TaggedArg, TypedArrayKind};
pub use error::EventsError;
pub use event::{
    AdoptedStyleSheetData, AdoptedStyles, CanvasMutationData, CustomData, Event, EventData,
    FontData, FullSnapshotData, IncrementalData, InitialOffset, InputData, LogData, MediaInteraction,
    MediaInteractionData, MetaData, MouseInteraction, MouseInteractionData, MouseMoveData,
    MousePosition, PluginData, ScrollData, SelectionData, SelectionRange, Session,
    StyleDeclarationData, StyleDeclarationRemove, StyleDeclarationSet, StyleRuleAdd,
    StyleRuleRemove, StyleSheetRuleData, ViewportResizeData,
};
pub use mutation::{
    AddedNode, AttributeChange, AttributeMutation, MutationData, RemovedNode, StyleChange,
    TextMutation,
};
pub use node::{Attributes, NodeType, SerializedData, SerializedNode};
