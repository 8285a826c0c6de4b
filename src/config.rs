use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client_id: String,
    /// Empty means the PKCE flow is used for the code exchange.
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub muted: bool,
    /// Advance the local preview queue when a preview ends.
    #[serde(default)]
    pub auto_advance: bool,
    /// Max URIs sent in one explicit remote play request.
    #[serde(default = "default_context_queue_limit")]
    pub context_queue_limit: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_activation_cooldown_secs")]
    pub activation_cooldown_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8888/callback".to_string()
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_accounts_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_market() -> String {
    "from_token".to_string()
}

fn default_volume() -> f32 {
    0.5
}

fn default_context_queue_limit() -> usize {
    5
}

fn default_history_limit() -> usize {
    20
}

fn default_activation_cooldown_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            api_base_url: default_api_base_url(),
            accounts_url: default_accounts_url(),
            market: default_market(),
            volume: default_volume(),
            muted: false,
            auto_advance: false,
            context_queue_limit: default_context_queue_limit(),
            history_limit: default_history_limit(),
            activation_cooldown_secs: default_activation_cooldown_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".spotiplayer"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn storage_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("storage.json"))
    }

    pub fn load() -> AppResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Err(AppError::Config(
                "Config file not found. Please run setup.".into(),
            ));
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> AppResult<()> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)?;
        let path = Self::config_path()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Overlay `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET` and
    /// `SPOTIFY_REDIRECT_URI` when they are set.
    pub fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("SPOTIFY_CLIENT_ID") {
            self.client_id = id;
        }
        if let Ok(secret) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            self.client_secret = secret;
        }
        if let Ok(uri) = std::env::var("SPOTIFY_REDIRECT_URI") {
            self.redirect_uri = uri;
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_url.trim_end_matches('/'))
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.accounts_url.trim_end_matches('/'))
    }

    pub fn uses_pkce(&self) -> bool {
        self.client_secret.is_empty()
    }

    /// Volume the player starts with, honouring the mute flag.
    pub fn initial_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume.clamp(0.0, 1.0)
        }
    }
}
