//! Inbound events from the embedded playback SDK, delivered through an
//! explicit channel the engine owns.

use crate::api::models::Track;
use tokio::sync::mpsc;

/// Snapshot carried by `player_state_changed`.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkPlayerState {
    pub current_track: Option<Track>,
    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    StateChanged(Option<SdkPlayerState>),
    /// `initialization_error`, `authentication_error`, `account_error` or
    /// `playback_error`; `kind` is the prefix.
    Error { kind: String, message: String },
}

pub type SdkEventSender = mpsc::UnboundedSender<SdkEvent>;
pub type SdkEventReceiver = mpsc::UnboundedReceiver<SdkEvent>;

pub fn sdk_channel() -> (SdkEventSender, SdkEventReceiver) {
    mpsc::unbounded_channel()
}
