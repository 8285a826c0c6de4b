//! Local preview playback, used when no remote device can take over.

#[cfg(feature = "native-audio")]
mod decoder;
#[cfg(feature = "native-audio")]
pub mod player;
pub mod silent;

use crate::api::models::Track;
use crate::error::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::mpsc;

#[cfg(feature = "native-audio")]
pub use player::NativeOutput;
pub use silent::SilentOutput;

/// Native play/pause/end notifications from an output. They are mirrored into
/// the playback state even when the engine did not cause them.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Playing,
    Paused,
    Ended,
    Error(String),
}

pub type AudioEventSender = mpsc::UnboundedSender<AudioEvent>;
pub type AudioEventReceiver = mpsc::UnboundedReceiver<AudioEvent>;

pub fn event_channel() -> (AudioEventSender, AudioEventReceiver) {
    mpsc::unbounded_channel()
}

/// A local audio sink. Implementations report state changes on the event
/// channel they were built with.
pub trait AudioOutput: Send + Sync {
    /// Replaces whatever is loaded and starts playing `url` from the start.
    fn load(&self, url: &str, duration_ms: u64) -> AppResult<()>;
    fn play(&self) -> AppResult<()>;
    fn pause(&self);
    fn stop(&self);
    fn seek(&self, position_ms: u64);
    fn set_volume(&self, volume: f32);
    /// Current playback clock. Outputs detect the end of the clip here.
    fn position_ms(&self) -> u64;
}

/// Builds the platform output: cpal when compiled with `native-audio`,
/// otherwise a clock-only output.
pub fn default_output(events: AudioEventSender) -> AppResult<Arc<dyn AudioOutput>> {
    #[cfg(feature = "native-audio")]
    {
        Ok(Arc::new(NativeOutput::new(events)?))
    }
    #[cfg(not(feature = "native-audio"))]
    {
        log::info!("[default_output] Built without native-audio, previews play silently");
        Ok(Arc::new(SilentOutput::new(events)))
    }
}

/// Binds tracks to the output.
pub struct LocalAudio {
    output: Arc<dyn AudioOutput>,
}

impl LocalAudio {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self { output }
    }

    pub fn output(&self) -> &Arc<dyn AudioOutput> {
        &self.output
    }

    pub fn start(&self, track: &Track) -> AppResult<()> {
        let url = track
            .preview_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(AppError::NoPreviewAvailable)?;
        log::info!("[LocalAudio::start] {} - {}", track.artist_names(), track.name);
        self.output
            .load(url, track.duration_ms)
            .map_err(into_local_error)
    }

    pub fn resume(&self) -> AppResult<()> {
        self.output.play().map_err(into_local_error)
    }

    pub fn pause(&self) {
        self.output.pause();
    }

    pub fn stop(&self) {
        self.output.stop();
    }

    pub fn seek(&self, position_ms: u64) {
        self.output.seek(position_ms);
    }

    pub fn set_volume(&self, volume: f32) {
        self.output.set_volume(volume);
    }

    pub fn position_ms(&self) -> u64 {
        self.output.position_ms()
    }
}

fn into_local_error(err: AppError) -> AppError {
    match err {
        AppError::LocalPlayback(_) => err,
        other => AppError::LocalPlayback(other.to_string()),
    }
}
