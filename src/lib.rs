pub mod api;
pub mod audio;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod player;
pub mod session;
pub mod storage;

use api::auth::OAuthClient;
use api::client::SpotifyClient;
use audio::{AudioEventReceiver, AudioOutput};
use config::AppConfig;
use device::DeviceResolver;
use error::AppResult;
use events::{EventReceiver, EventSender};
use player::sdk::{sdk_channel, SdkEventSender};
use player::tasks::BackgroundTasks;
use player::PlaybackEngine;
use session::{AccountTier, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use storage::Storage;
use tokio::sync::Mutex;

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Process-wide services, wired once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub session: Arc<SessionManager>,
    pub client: Arc<SpotifyClient>,
    pub devices: Arc<DeviceResolver>,
    pub engine: Arc<PlaybackEngine>,
    pub events: EventSender,
    /// Feed for the embedded playback SDK's callbacks.
    pub sdk_events: SdkEventSender,
    pub pkce_verifier: Mutex<Option<String>>,
    tasks: std::sync::Mutex<BackgroundTasks>,
}

impl AppState {
    /// Wires the services together and starts the background listeners.
    /// Must be called inside a tokio runtime.
    pub fn build(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        output: Arc<dyn AudioOutput>,
        audio_events: AudioEventReceiver,
    ) -> AppResult<Self> {
        let events = events::event_bus();

        let oauth = OAuthClient::new(&config)?;
        let session = Arc::new(SessionManager::new(
            oauth,
            Arc::clone(&storage),
            events.clone(),
        ));
        let client = Arc::new(SpotifyClient::new(&config, Arc::clone(&session))?);
        let devices = Arc::new(DeviceResolver::new(
            Arc::clone(&client),
            storage,
            config.activation_cooldown_secs,
            events.clone(),
        ));
        let engine = Arc::new(PlaybackEngine::new(
            Arc::clone(&client),
            Arc::clone(&devices),
            output,
            &config,
            events.clone(),
        ));

        let (sdk_events, sdk_rx) = sdk_channel();
        let tasks = BackgroundTasks::spawn(
            Arc::clone(&engine),
            audio_events,
            sdk_rx,
            Duration::from_millis(config.poll_interval_ms.max(100)),
        );

        log::info!(
            "[AppState::build] api={} authenticated={}",
            config.api_base_url,
            session.is_authenticated()
        );

        Ok(Self {
            config,
            session,
            client,
            devices,
            engine,
            events,
            sdk_events,
            pkce_verifier: Mutex::new(None),
            tasks: std::sync::Mutex::new(tasks),
        })
    }

    /// Production wiring: file storage under the config dir and the default
    /// audio output.
    pub fn bootstrap(config: AppConfig) -> AppResult<Self> {
        let storage: Arc<dyn Storage> = Arc::new(storage::FileStorage::open_default()?);
        let (audio_tx, audio_rx) = audio::event_channel();
        let output = audio::default_output(audio_tx)?;
        Self::build(config, storage, output, audio_rx)
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Looks up the account class and records it on the session.
    pub async fn refresh_account_tier(&self) -> AppResult<AccountTier> {
        let profile = self.client.get_current_user().await?;
        let tier = AccountTier::from_product(profile.product.as_deref());
        self.session.set_account_tier(tier);
        Ok(tier)
    }

    pub fn logout(&self) {
        log::info!("[logout]");
        self.engine.reset();
        self.devices.forget();
        self.session.clear_session();
    }

    pub fn shutdown(&self) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .shutdown();
    }
}
