use crate::api::models::Track;
use crate::error::ErrorInfo;
use crate::player::queue::PlaybackQueue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Album,
    Playlist,
    Artist,
    Collection,
    Track,
    None,
}

impl ContextKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Album => "album",
            ContextKind::Playlist => "playlist",
            ContextKind::Artist => "artist",
            ContextKind::Collection => "collection",
            ContextKind::Track => "track",
            ContextKind::None => "none",
        }
    }
}

impl std::str::FromStr for ContextKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "album" => Ok(ContextKind::Album),
            "playlist" => Ok(ContextKind::Playlist),
            "artist" => Ok(ContextKind::Artist),
            "collection" => Ok(ContextKind::Collection),
            "track" => Ok(ContextKind::Track),
            "none" => Ok(ContextKind::None),
            other => Err(format!("unknown context type: {}", other)),
        }
    }
}

/// The container currently framing playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackContext {
    #[serde(rename = "type")]
    pub kind: ContextKind,
    pub id: Option<String>,
}

impl PlaybackContext {
    pub fn new(kind: ContextKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
        }
    }

    pub fn none() -> Self {
        Self {
            kind: ContextKind::None,
            id: None,
        }
    }

    pub fn track(track_id: &str) -> Self {
        Self::new(ContextKind::Track, track_id)
    }

    pub fn matches(&self, kind: ContextKind, id: &str) -> bool {
        self.kind == kind && self.id.as_deref() == Some(id)
    }

    /// Remote context URI; only albums and playlists have one.
    pub fn remote_uri(&self) -> Option<String> {
        match (self.kind, self.id.as_deref()) {
            (ContextKind::Album | ContextKind::Playlist, Some(id)) => {
                Some(format!("spotify:{}:{}", self.kind.as_str(), id))
            }
            _ => None,
        }
    }
}

impl Default for PlaybackContext {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Context,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Context,
            RepeatMode::Context => RepeatMode::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Context => "context",
        }
    }

    pub fn from_remote(state: &str) -> Option<Self> {
        match state {
            "off" => Some(RepeatMode::Off),
            "track" => Some(RepeatMode::Track),
            "context" => Some(RepeatMode::Context),
            _ => None,
        }
    }
}

/// Where the current track is being rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackSource {
    #[default]
    None,
    Remote,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Idle,
    Loading,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub context: PlaybackContext,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub volume: f32,
    #[serde(flatten)]
    pub queue: PlaybackQueue,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
    pub is_loading: bool,
    pub last_error: Option<ErrorInfo>,
    pub source: PlaybackSource,
}

impl PlaybackState {
    pub fn new(volume: f32, history_limit: usize) -> Self {
        Self {
            current_track: None,
            context: PlaybackContext::none(),
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            volume: volume.clamp(0.0, 1.0),
            queue: PlaybackQueue::new(history_limit),
            is_shuffled: false,
            repeat_mode: RepeatMode::Off,
            is_loading: false,
            last_error: None,
            source: PlaybackSource::None,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        if self.is_loading {
            PlayerStatus::Loading
        } else if self.current_track.is_none() {
            PlayerStatus::Idle
        } else if self.is_playing {
            PlayerStatus::Playing
        } else {
            PlayerStatus::Paused
        }
    }

    /// Makes `track` current, starting from zero.
    pub fn begin_track(&mut self, track: Track, context: PlaybackContext, source: PlaybackSource) {
        self.duration_ms = track.duration_ms;
        self.position_ms = 0;
        self.current_track = Some(track);
        self.context = context;
        self.source = source;
        self.is_playing = true;
    }

    pub fn set_position(&mut self, position_ms: u64) {
        self.position_ms = position_ms.min(self.duration_ms);
    }

    /// Sets the playing flag, never letting it be true without a track.
    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing && self.current_track.is_some();
    }

    pub fn is_track_playing(&self, track_id: &str) -> bool {
        self.is_playing
            && self
                .current_track
                .as_ref()
                .is_some_and(|track| track.id == track_id)
    }

    pub fn is_context_playing(&self, kind: ContextKind, id: &str) -> bool {
        self.is_playing && self.context.matches(kind, id)
    }

    /// Back to `Idle`, keeping volume and user preferences.
    pub fn clear_playback(&mut self) {
        self.current_track = None;
        self.context = PlaybackContext::none();
        self.is_playing = false;
        self.position_ms = 0;
        self.duration_ms = 0;
        self.queue.clear();
        self.source = PlaybackSource::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::AlbumRef;

    fn track(id: &str, duration_ms: u64) -> Track {
        Track {
            id: id.into(),
            name: id.into(),
            artists: vec![],
            album: AlbumRef::default(),
            duration_ms,
            preview_url: None,
            uri: format!("spotify:track:{}", id),
        }
    }

    #[test]
    fn repeat_mode_cycles() {
        let mut mode = RepeatMode::Off;
        let mut seen = vec![];
        for _ in 0..4 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![
                RepeatMode::Track,
                RepeatMode::Context,
                RepeatMode::Off,
                RepeatMode::Track
            ]
        );
    }

    #[test]
    fn position_is_clamped_to_duration() {
        let mut state = PlaybackState::new(0.5, 20);
        state.begin_track(track("a", 30_000), PlaybackContext::track("a"), PlaybackSource::Local);
        state.set_position(45_000);
        assert_eq!(state.position_ms, 30_000);
    }

    #[test]
    fn playing_requires_a_track() {
        let mut state = PlaybackState::new(0.5, 20);
        state.set_playing(true);
        assert!(!state.is_playing);
        assert_eq!(state.status(), PlayerStatus::Idle);
    }

    #[test]
    fn context_indicators() {
        let mut state = PlaybackState::new(0.5, 20);
        state.begin_track(
            track("t1", 1_000),
            PlaybackContext::new(ContextKind::Album, "al1"),
            PlaybackSource::Remote,
        );
        assert!(state.is_context_playing(ContextKind::Album, "al1"));
        assert!(!state.is_context_playing(ContextKind::Playlist, "al1"));
        assert!(state.is_track_playing("t1"));

        state.set_playing(false);
        assert!(!state.is_context_playing(ContextKind::Album, "al1"));
        assert_eq!(state.status(), PlayerStatus::Paused);
    }

    #[test]
    fn only_albums_and_playlists_have_remote_uris() {
        assert_eq!(
            PlaybackContext::new(ContextKind::Playlist, "p1").remote_uri(),
            Some("spotify:playlist:p1".to_string())
        );
        assert_eq!(PlaybackContext::new(ContextKind::Artist, "ar").remote_uri(), None);
        assert_eq!(PlaybackContext::none().remote_uri(), None);
    }
}
