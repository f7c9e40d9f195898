//! Identifiers and time sources shared by the capture and replay crates.

mod clock;
mod id;

pub use clock::{Clock, ManualClock, SystemClock, millis};
pub use id::{Id, IdGenerator};
