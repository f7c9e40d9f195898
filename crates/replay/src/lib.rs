//! Replay side: rebuilds recorded documents and plays sessions back.

mod config;
mod error;
pub mod export;
pub mod rebuild;
pub mod reconcile;
mod replayer;
pub mod state;
pub mod timer;
mod tree;

pub use config::ReplayerConfig;
pub use error::ReplayError;
pub use export::export;
pub use rebuild::{build_node, rebuild};
pub use reconcile::{ReconcileStats, reconcile};
pub use replayer::{EventHook, PlaybackMeta, PlayerStatus, Replayer};
pub use state::ReplayState;
pub use timer::{Action, Timer, TimerState};
pub use tree::{ApplyReport, ReplayTree};
