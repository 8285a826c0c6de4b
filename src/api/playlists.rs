use crate::api::client::SpotifyClient;
use crate::api::models::{Paging, PlaylistItem, Track};
use crate::error::AppResult;

impl SpotifyClient {
    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> AppResult<Vec<Track>> {
        let path = format!("/playlists/{}/tracks", playlist_id);
        let page: Paging<PlaylistItem> = self
            .get_json(&path, &[("limit", "100"), ("market", self.market())])
            .await?;

        let total = page.items.len();
        let tracks: Vec<Track> = page.items.into_iter().filter_map(|item| item.track).collect();
        if tracks.len() < total {
            log::debug!(
                "[get_playlist_tracks] {} skipped {} unavailable items",
                playlist_id,
                total - tracks.len()
            );
        }
        Ok(tracks)
    }
}
