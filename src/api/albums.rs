use crate::api::client::SpotifyClient;
use crate::api::models::{Paging, Track};
use crate::error::AppResult;

impl SpotifyClient {
    /// Tracks of an album. The listing omits the album object, so the id is
    /// filled back in from the request.
    pub async fn get_album_tracks(&self, album_id: &str) -> AppResult<Vec<Track>> {
        let path = format!("/albums/{}/tracks", album_id);
        let page: Paging<Track> = self
            .get_json(&path, &[("limit", "50"), ("market", self.market())])
            .await?;

        log::info!("[get_album_tracks] {} -> {} tracks", album_id, page.items.len());

        Ok(page
            .items
            .into_iter()
            .map(|mut track| {
                if track.album.id.is_empty() {
                    track.album.id = album_id.to_string();
                }
                track
            })
            .collect())
    }
}
