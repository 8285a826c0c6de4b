use crate::api::client::SpotifyClient;
use crate::api::models::UserProfile;
use crate::error::AppResult;

impl SpotifyClient {
    pub async fn get_current_user(&self) -> AppResult<UserProfile> {
        self.get_json("/me", &[]).await
    }
}
