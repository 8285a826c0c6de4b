use crate::api::client::SpotifyClient;
use crate::api::models::Track;
use crate::error::AppResult;

impl SpotifyClient {
    pub async fn get_track(&self, track_id: &str) -> AppResult<Track> {
        let path = format!("/tracks/{}", track_id);
        self.get_json(&path, &[("market", self.market())]).await
    }
}
