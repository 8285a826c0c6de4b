use crate::api::models::Track;
use crate::error::ErrorInfo;
use crate::player::state::{PlaybackSource, PlayerStatus};
use crate::session::AccountTier;
use serde::Serialize;
use tokio::sync::broadcast;

pub type EventSender = broadcast::Sender<PlayerEvent>;
pub type EventReceiver = broadcast::Receiver<PlayerEvent>;

const EVENT_CAPACITY: usize = 64;

pub fn event_bus() -> EventSender {
    broadcast::channel(EVENT_CAPACITY).0
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PlayerEvent {
    TrackChanged(TrackChangedPayload),
    StateChanged(StateChangedPayload),
    Progress(ProgressPayload),
    QueueChanged(QueueChangedPayload),
    Error(ErrorInfo),
    AuthStateChanged(AuthStatePayload),
    DeviceReady { device_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressPayload {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub position_fraction: f64,
}

impl ProgressPayload {
    pub fn new(position_ms: u64, duration_ms: u64) -> Self {
        let position_fraction = if duration_ms > 0 {
            (position_ms as f64 / duration_ms as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            position_ms,
            duration_ms,
            position_fraction,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackChangedPayload {
    pub track_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub artwork_url: Option<String>,
    pub source: PlaybackSource,
}

impl TrackChangedPayload {
    pub fn new(track: &Track, source: PlaybackSource) -> Self {
        Self {
            track_id: track.id.clone(),
            name: track.name.clone(),
            artist: track.artist_names(),
            album: track.album.name.clone(),
            duration_ms: track.duration_ms,
            artwork_url: track.artwork_url().map(str::to_string),
            source,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateChangedPayload {
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueChangedPayload {
    pub queue_len: usize,
    pub history_len: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthStatePayload {
    pub authenticated: bool,
    pub account_tier: AccountTier,
}
