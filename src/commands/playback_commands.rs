use crate::error::{AppError, AppResult};
use crate::player::sdk::SdkEvent;
use crate::player::{ContextKind, PlaybackState, RepeatMode};

use crate::AppState;

pub async fn play_track(state: &AppState, track_id: &str) -> AppResult<()> {
    log::info!("[play_track] track_id={}", track_id);
    let track = state.client.get_track(track_id).await?;
    state.engine.play_track(track, None).await
}

pub async fn play_context(state: &AppState, kind: &str, id: &str) -> AppResult<()> {
    let kind: ContextKind = kind.parse().map_err(AppError::InvalidCommand)?;
    state.engine.play_context(kind, id, None).await
}

/// Plays an ad-hoc list of tracks (e.g. liked songs) as a collection.
pub async fn play_collection(state: &AppState, id: &str, track_ids: &[String]) -> AppResult<()> {
    log::info!("[play_collection] {} with {} tracks", id, track_ids.len());
    let mut tracks = Vec::with_capacity(track_ids.len());
    for track_id in track_ids {
        tracks.push(state.client.get_track(track_id).await?);
    }
    state
        .engine
        .play_context(ContextKind::Collection, id, Some(tracks))
        .await
}

pub async fn play_pause(state: &AppState) -> AppResult<()> {
    state.engine.play_pause().await
}

pub async fn next_track(state: &AppState) -> AppResult<()> {
    state.engine.next_track().await
}

pub async fn previous_track(state: &AppState) -> AppResult<()> {
    state.engine.previous_track().await
}

pub async fn toggle_shuffle(state: &AppState) -> AppResult<bool> {
    state.engine.toggle_shuffle().await
}

pub async fn toggle_repeat(state: &AppState) -> RepeatMode {
    state.engine.toggle_repeat_mode()
}

pub async fn set_volume(state: &AppState, volume: f32) {
    state.engine.set_volume(volume).await
}

pub async fn seek(state: &AppState, position_ms: u64) -> AppResult<()> {
    state.engine.seek(position_ms).await
}

pub async fn get_playback_state(state: &AppState) -> PlaybackState {
    state.engine.state()
}

pub async fn clear_error(state: &AppState) {
    state.engine.clear_error()
}

/// Forwards the SDK's `ready` callback.
pub async fn device_ready(state: &AppState, device_id: &str) -> AppResult<()> {
    state
        .sdk_events
        .send(SdkEvent::Ready {
            device_id: device_id.to_string(),
        })
        .map_err(|_| AppError::Config("Player event loop is not running".into()))
}
