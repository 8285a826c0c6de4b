use crate::api::client::SpotifyClient;
use crate::api::models::{TopTracks, Track};
use crate::error::AppResult;

impl SpotifyClient {
    pub async fn get_artist_top_tracks(&self, artist_id: &str) -> AppResult<Vec<Track>> {
        let path = format!("/artists/{}/top-tracks", artist_id);
        let top: TopTracks = self.get_json(&path, &[("market", self.market())]).await?;
        Ok(top.tracks)
    }
}
