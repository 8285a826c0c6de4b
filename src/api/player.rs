//! Remote playback control endpoints (`/me/player/*`).

use crate::api::client::SpotifyClient;
use crate::api::models::RemotePlaybackState;
use crate::error::AppResult;
use reqwest::StatusCode;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayOffset {
    pub uri: String,
}

/// Body of `PUT /me/player/play`: either an explicit URI list or a context
/// URI with an optional starting track.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
    pub position_ms: u64,
}

impl PlayRequest {
    pub fn uris(uris: Vec<String>) -> Self {
        Self {
            uris: Some(uris),
            context_uri: None,
            offset: None,
            position_ms: 0,
        }
    }

    pub fn context(context_uri: String, start_uri: Option<String>) -> Self {
        Self {
            uris: None,
            context_uri: Some(context_uri),
            offset: start_uri.map(|uri| PlayOffset { uri }),
            position_ms: 0,
        }
    }
}

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, &str)> {
    device_id.map(|id| vec![("device_id", id)]).unwrap_or_default()
}

impl SpotifyClient {
    pub async fn start_playback(
        &self,
        device_id: Option<&str>,
        request: &PlayRequest,
    ) -> AppResult<()> {
        let body = serde_json::to_value(request)?;
        self.put("/me/player/play", &device_query(device_id), Some(&body))
            .await
    }

    pub async fn resume_playback(&self, device_id: Option<&str>) -> AppResult<()> {
        self.put("/me/player/play", &device_query(device_id), None)
            .await
    }

    pub async fn pause_playback(&self, device_id: Option<&str>) -> AppResult<()> {
        self.put("/me/player/pause", &device_query(device_id), None)
            .await
    }

    pub async fn skip_to_next(&self, device_id: Option<&str>) -> AppResult<()> {
        self.post("/me/player/next", &device_query(device_id), None)
            .await
    }

    pub async fn skip_to_previous(&self, device_id: Option<&str>) -> AppResult<()> {
        self.post("/me/player/previous", &device_query(device_id), None)
            .await
    }

    pub async fn set_shuffle(&self, state: bool, device_id: Option<&str>) -> AppResult<()> {
        let state = if state { "true" } else { "false" };
        let mut query = vec![("state", state)];
        query.extend(device_query(device_id));
        self.put("/me/player/shuffle", &query, None).await
    }

    pub async fn set_repeat(&self, state: &str, device_id: Option<&str>) -> AppResult<()> {
        let mut query = vec![("state", state)];
        query.extend(device_query(device_id));
        self.put("/me/player/repeat", &query, None).await
    }

    pub async fn set_remote_volume(&self, percent: u8, device_id: Option<&str>) -> AppResult<()> {
        let percent = percent.min(100).to_string();
        let mut query = vec![("volume_percent", percent.as_str())];
        query.extend(device_query(device_id));
        self.put("/me/player/volume", &query, None).await
    }

    pub async fn seek_remote(&self, position_ms: u64, device_id: Option<&str>) -> AppResult<()> {
        let position = position_ms.to_string();
        let mut query = vec![("position_ms", position.as_str())];
        query.extend(device_query(device_id));
        self.put("/me/player/seek", &query, None).await
    }

    /// Moves playback to `device_id` without starting it when `play` is false.
    pub async fn transfer_playback(&self, device_id: &str, play: bool) -> AppResult<()> {
        let body = serde_json::json!({
            "device_ids": [device_id],
            "play": play,
        });
        self.put("/me/player", &[], Some(&body)).await
    }

    /// `None` when nothing is playing on any device (204).
    pub async fn get_playback_state(&self) -> AppResult<Option<RemotePlaybackState>> {
        let response = self.get("/me/player", &[]).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_request_omits_uris() {
        let request = PlayRequest::context(
            "spotify:album:a1".into(),
            Some("spotify:track:t3".into()),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["context_uri"], "spotify:album:a1");
        assert_eq!(json["offset"]["uri"], "spotify:track:t3");
        assert_eq!(json["position_ms"], 0);
        assert!(json.get("uris").is_none());
    }

    #[test]
    fn uri_request_omits_context() {
        let json =
            serde_json::to_value(PlayRequest::uris(vec!["spotify:track:t1".into()])).unwrap();
        assert_eq!(json["uris"][0], "spotify:track:t1");
        assert!(json.get("context_uri").is_none());
        assert!(json.get("offset").is_none());
    }
}
