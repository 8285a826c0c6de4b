pub mod engine;
pub mod queue;
pub mod sdk;
pub mod state;
pub mod tasks;

pub use engine::PlaybackEngine;
pub use state::{ContextKind, PlaybackContext, PlaybackSource, PlaybackState, PlayerStatus, RepeatMode};
