//! Tracks the single remote playback device and (re-)activates it.

use crate::api::client::SpotifyClient;
use crate::events::{EventSender, PlayerEvent};
use crate::now_millis;
use crate::storage::{Storage, DEVICE_ACTIVATED_AT_KEY, DEVICE_ID_KEY};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    /// 429; the device is assumed to be active already.
    RateLimited,
    /// Within the cooldown window, no request was made.
    Skipped,
    Failed,
}

impl ActivationOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, ActivationOutcome::Failed)
    }
}

pub struct DeviceResolver {
    client: Arc<SpotifyClient>,
    storage: Arc<dyn Storage>,
    device_id: RwLock<Option<String>>,
    last_activated_at: RwLock<Option<i64>>,
    cooldown_ms: i64,
    /// Serializes activations so two readiness events inside the cooldown
    /// window cannot both reach the network.
    activation: Mutex<()>,
    events: EventSender,
}

impl DeviceResolver {
    pub fn new(
        client: Arc<SpotifyClient>,
        storage: Arc<dyn Storage>,
        cooldown_secs: u64,
        events: EventSender,
    ) -> Self {
        let device_id = storage.get(DEVICE_ID_KEY).filter(|id| !id.is_empty());
        let last_activated_at = storage
            .get(DEVICE_ACTIVATED_AT_KEY)
            .and_then(|raw| raw.parse::<i64>().ok());

        Self {
            client,
            storage,
            device_id: RwLock::new(device_id),
            last_activated_at: RwLock::new(last_activated_at),
            cooldown_ms: (cooldown_secs as i64) * 1000,
            activation: Mutex::new(()),
            events,
        }
    }

    pub fn current_device_id(&self) -> Option<String> {
        self.device_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_activated_at(&self) -> Option<i64> {
        *self
            .last_activated_at
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Records the device reported by the player SDK and activates it unless
    /// an activation happened within the cooldown.
    pub async fn on_device_ready(&self, device_id: &str) -> ActivationOutcome {
        log::info!("[on_device_ready] device_id={}", device_id);
        *self.device_id.write().unwrap_or_else(|e| e.into_inner()) = Some(device_id.to_string());
        if let Err(e) = self.storage.set(DEVICE_ID_KEY, device_id) {
            log::error!("[on_device_ready] Failed to persist device id: {}", e);
        }
        let _ = self.events.send(PlayerEvent::DeviceReady {
            device_id: device_id.to_string(),
        });

        self.activate(device_id).await
    }

    pub async fn activate(&self, device_id: &str) -> ActivationOutcome {
        let _guard = self.activation.lock().await;

        let now = now_millis();
        if let Some(last) = self.last_activated_at() {
            if now - last < self.cooldown_ms {
                log::debug!(
                    "[activate] Skipping, activated {}ms ago",
                    now - last
                );
                return ActivationOutcome::Skipped;
            }
        }

        match self.client.transfer_playback(device_id, false).await {
            Ok(()) => {
                log::info!("[activate] Device {} activated", device_id);
                self.record_activation(now_millis());
                ActivationOutcome::Activated
            }
            Err(e) if e.status() == Some(429) => {
                log::warn!("[activate] Rate limited, device presumed active");
                self.record_activation(now_millis());
                ActivationOutcome::RateLimited
            }
            Err(e) => {
                log::warn!("[activate] Failed to activate device {}: {}", device_id, e);
                ActivationOutcome::Failed
            }
        }
    }

    fn record_activation(&self, at: i64) {
        *self
            .last_activated_at
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(at);
        if let Err(e) = self.storage.set(DEVICE_ACTIVATED_AT_KEY, &at.to_string()) {
            log::error!("[activate] Failed to persist activation time: {}", e);
        }
    }

    /// Forgets the device; used on logout.
    pub fn forget(&self) {
        *self.device_id.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self
            .last_activated_at
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
        for key in [DEVICE_ID_KEY, DEVICE_ACTIVATED_AT_KEY] {
            if let Err(e) = self.storage.remove(key) {
                log::error!("[forget] Failed to clear {}: {}", key, e);
            }
        }
    }
}
