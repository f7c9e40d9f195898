//! Capture side: turns document changes and host observations into events.

mod buffer;
pub mod canvas;
pub mod iframe;
mod options;
mod recorder;

pub use buffer::{MutationBuffer, style_diff};
pub use canvas::{CanvasCall, CanvasRecorder};
pub use iframe::{CrossContextMirror, IframeManager};
pub use options::RecordOptions;
pub use recorder::{EmitFn, MediaState, PointerSample, Recorder, SelectionSpan};
