use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: AlbumRef,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
    pub uri: String,
}

impl Track {
    pub fn has_preview(&self) -> bool {
        self.preview_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.album.images.first().map(|i| i.url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: u32,
}

/// Entry of a playlist's track listing; `track` is null for removed or
/// unavailable items.
#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Deserialize)]
pub struct TopTracks {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDevice {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u32>,
}

/// Body of `GET /me/player`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePlaybackState {
    #[serde(default)]
    pub device: Option<RemoteDevice>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<Track>,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default)]
    pub repeat_state: Option<String>,
}

/// Error envelope returned by the Web API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error envelope returned by the accounts token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_without_album_or_preview_deserializes() {
        let track: Track = serde_json::from_str(
            r#"{
                "id": "t1",
                "name": "Intro",
                "artists": [{"id": "a1", "name": "Band"}, {"id": "a2", "name": "Guest"}],
                "duration_ms": 30000,
                "preview_url": null,
                "uri": "spotify:track:t1"
            }"#,
        )
        .unwrap();

        assert!(!track.has_preview());
        assert_eq!(track.album, AlbumRef::default());
        assert_eq!(track.artist_names(), "Band, Guest");
    }

    #[test]
    fn playlist_items_tolerate_null_tracks() {
        let page: Paging<PlaylistItem> =
            serde_json::from_str(r#"{"items": [{"track": null}], "total": 1}"#).unwrap();
        assert!(page.items[0].track.is_none());
    }
}
