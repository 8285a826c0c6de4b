//! Shared fixtures: a recording audio output, track builders and an app wired
//! to a mock Web API.

#![allow(dead_code)]

use spotiplayer::api::auth::OAuthClient;
use spotiplayer::api::client::SpotifyClient;
use spotiplayer::api::models::{AlbumRef, ArtistRef, Track};
use spotiplayer::audio::{event_channel, AudioEventSender, AudioOutput};
use spotiplayer::config::AppConfig;
use spotiplayer::error::{AppError, AppResult};
use spotiplayer::events::event_bus;
use spotiplayer::session::{AccountTier, Session, SessionManager};
use spotiplayer::storage::{MemoryStorage, Storage, DEVICE_ID_KEY, SESSION_KEY};
use spotiplayer::AppState;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

pub const DEVICE_ID: &str = "device-1";
pub const ACCESS_TOKEN: &str = "access-1";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Audio output that records what it was asked to do.
#[derive(Default)]
pub struct FakeOutput {
    pub loads: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub fail_loads: AtomicBool,
    pub position: AtomicU64,
}

impl FakeOutput {
    pub fn loaded(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AudioOutput for FakeOutput {
    fn load(&self, url: &str, _duration_ms: u64) -> AppResult<()> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(AppError::LocalPlayback("playback rejected".into()));
        }
        self.record("load");
        self.loads.lock().unwrap().push(url.to_string());
        self.position.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self) -> AppResult<()> {
        self.record("play");
        Ok(())
    }

    fn pause(&self) {
        self.record("pause");
    }

    fn stop(&self) {
        self.record("stop");
    }

    fn seek(&self, position_ms: u64) {
        self.record("seek");
        self.position.store(position_ms, Ordering::SeqCst);
    }

    fn set_volume(&self, _volume: f32) {}

    fn position_ms(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }
}

pub fn track(id: &str, with_preview: bool) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Song {}", id),
        artists: vec![ArtistRef {
            id: "artist-1".into(),
            name: "The Band".into(),
        }],
        album: AlbumRef {
            id: "album-1".into(),
            name: "Record".into(),
            images: vec![],
        },
        duration_ms: 180_000,
        preview_url: with_preview.then(|| format!("https://p.scdn.co/mp3-preview/{}", id)),
        uri: format!("spotify:track:{}", id),
    }
}

pub fn track_json(id: &str, with_preview: bool) -> serde_json::Value {
    serde_json::to_value(track(id, with_preview)).unwrap()
}

pub fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        client_id: "client-1".into(),
        api_base_url: format!("{}/v1", server.uri()),
        accounts_url: server.uri(),
        poll_interval_ms: 60_000,
        ..AppConfig::default()
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stores a session that expires `expires_in_ms` from now (negative for an
/// already expired one).
pub fn seed_session(storage: &dyn Storage, tier: AccountTier, expires_in_ms: i64) {
    let session = Session {
        access_token: Some(ACCESS_TOKEN.into()),
        refresh_token: Some(REFRESH_TOKEN.into()),
        expires_at: Some(now_ms() + expires_in_ms),
        authenticated: true,
        account_tier: tier,
    };
    storage
        .set(SESSION_KEY, &serde_json::to_string(&session).unwrap())
        .unwrap();
}

pub fn session_manager(config: &AppConfig, storage: Arc<dyn Storage>) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        OAuthClient::new(config).unwrap(),
        storage,
        event_bus(),
    ))
}

pub fn spotify_client(config: &AppConfig, session: Arc<SessionManager>) -> Arc<SpotifyClient> {
    Arc::new(SpotifyClient::new(config, session).unwrap())
}

pub struct TestApp {
    pub server: MockServer,
    pub state: AppState,
    pub output: Arc<FakeOutput>,
    pub storage: Arc<MemoryStorage>,
    pub audio_tx: AudioEventSender,
}

pub struct AppOptions {
    pub tier: AccountTier,
    pub device: bool,
    pub auto_advance: bool,
    pub poll_interval_ms: u64,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            tier: AccountTier::Standard,
            device: false,
            auto_advance: false,
            poll_interval_ms: 60_000,
        }
    }
}

pub async fn app(options: AppOptions) -> TestApp {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    seed_session(storage.as_ref(), options.tier, 3_600_000);
    if options.device {
        storage.set(DEVICE_ID_KEY, DEVICE_ID).unwrap();
    }

    let config = AppConfig {
        auto_advance: options.auto_advance,
        poll_interval_ms: options.poll_interval_ms,
        ..config_for(&server)
    };
    let output = Arc::new(FakeOutput::default());
    let (audio_tx, audio_rx) = event_channel();
    let state = AppState::build(
        config,
        storage.clone(),
        output.clone(),
        audio_rx,
    )
    .unwrap();

    TestApp {
        server,
        state,
        output,
        storage,
        audio_tx,
    }
}

pub async fn standard_app() -> TestApp {
    app(AppOptions::default()).await
}

pub async fn premium_app(device: bool) -> TestApp {
    app(AppOptions {
        tier: AccountTier::Premium,
        device,
        ..AppOptions::default()
    })
    .await
}

/// Number of requests the server saw for `method` and `path`.
pub async fn hits(server: &MockServer, method: &str, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.to_string() == method && r.url.path() == path)
        .count()
}

pub fn ids(tracks: impl IntoIterator<Item = Track>) -> Vec<String> {
    tracks.into_iter().map(|t| t.id).collect()
}
