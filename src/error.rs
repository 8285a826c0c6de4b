use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("No playback device available")]
    NoDeviceAvailable,

    #[error("This track has no preview available")]
    NoPreviewAvailable,

    #[error("No device available and the track has no preview")]
    NoPlaybackSource,

    #[error("The collection has no tracks")]
    EmptyCollection,

    #[error("Spotify API error: {status} - {message}")]
    RemoteApi { status: u16, message: String },

    #[error("Local playback error: {0}")]
    LocalPlayback(String),

    #[error("Player SDK {kind}: {message}")]
    PlayerSdk { kind: String, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Http(_) => "http",
            AppError::Json(_) => "json",
            AppError::Io(_) => "io",
            AppError::Config(_) => "config",
            AppError::SessionExpired => "session_expired",
            AppError::NoDeviceAvailable => "no_device_available",
            AppError::NoPreviewAvailable => "no_preview_available",
            AppError::NoPlaybackSource => "no_playback_source",
            AppError::EmptyCollection => "empty_collection",
            AppError::RemoteApi { .. } => "remote_api",
            AppError::LocalPlayback(_) => "local_playback",
            AppError::PlayerSdk { .. } => "player_sdk",
            AppError::Decode(_) => "decode",
            AppError::InvalidCommand(_) => "invalid_command",
        }
    }

    /// Errors after which the user has to log in again.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, AppError::SessionExpired)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::RemoteApi { status, .. } => Some(*status),
            AppError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Cloneable snapshot of an [`AppError`], kept in the single `last_error` slot
/// of the playback state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&AppError> for ErrorInfo {
    fn from(err: &AppError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
