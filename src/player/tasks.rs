use crate::audio::AudioEventReceiver;
use crate::player::engine::PlaybackEngine;
use crate::player::sdk::SdkEventReceiver;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Listener and poller tasks tied to one engine. Dropping this aborts them.
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn spawn(
        engine: Arc<PlaybackEngine>,
        audio_events: AudioEventReceiver,
        sdk_events: SdkEventReceiver,
        poll_interval: Duration,
    ) -> Self {
        let handles = vec![
            tokio::spawn(audio_listener(Arc::clone(&engine), audio_events)),
            tokio::spawn(sdk_listener(Arc::clone(&engine), sdk_events)),
            tokio::spawn(position_poller(engine, poll_interval)),
        ];
        Self { handles }
    }

    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn audio_listener(engine: Arc<PlaybackEngine>, mut events: AudioEventReceiver) {
    while let Some(event) = events.recv().await {
        engine.handle_audio_event(event).await;
    }
    log::debug!("[audio_listener] Channel closed");
}

async fn sdk_listener(engine: Arc<PlaybackEngine>, mut events: SdkEventReceiver) {
    while let Some(event) = events.recv().await {
        engine.handle_sdk_event(event).await;
    }
    log::debug!("[sdk_listener] Channel closed");
}

/// Samples the position about once per interval, but only while something
/// is playing. The timer is dropped as soon as playback stops.
async fn position_poller(engine: Arc<PlaybackEngine>, every: Duration) {
    let mut state = engine.subscribe();

    loop {
        if state.wait_for(|s| s.is_playing).await.is_err() {
            return;
        }

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => engine.sample_position().await,
                changed = state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !state.borrow_and_update().is_playing {
                        break;
                    }
                }
            }
        }
        log::debug!("[position_poller] Playback stopped, poller idle");
    }
}
