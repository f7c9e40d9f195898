//! Full-tree serialization and the identity table shared with the recorder
//! and the replayer.

pub mod attributes;
pub mod masking;
mod mirror;
pub mod options;
mod pending;
mod serialize;
pub mod slim;

pub use masking::{is_blocked, is_input_ignored, mask_input_value, mask_text, needs_masking_text};
pub use mirror::{Mirror, NodeMeta};
pub use options::{ClassMatcher, MaskFn, SerializeOptions, SrcPredicate};
pub use pending::{LoadKind, PendingLoads};
pub use serialize::{
    SCRIPT_PLACEHOLDER, SerializeContext, SerializeFlags, SerializeObserver, snapshot,
};
pub use slim::SlimDomOptions;
