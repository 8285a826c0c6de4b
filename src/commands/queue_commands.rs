use crate::api::models::Track;
use crate::error::AppResult;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct QueueView {
    pub queue: Vec<Track>,
    pub history: Vec<Track>,
}

pub async fn get_queue(state: &AppState) -> QueueView {
    let playback = state.engine.state();
    QueueView {
        queue: playback.queue.upcoming().iter().cloned().collect(),
        history: playback.queue.history().iter().cloned().collect(),
    }
}

pub async fn add_to_queue(state: &AppState, track_id: &str) -> AppResult<()> {
    let track = state.client.get_track(track_id).await?;
    state.engine.add_to_queue(track);
    Ok(())
}
