use crate::audio::{AudioEvent, AudioEventSender, AudioOutput};
use crate::error::{AppError, AppResult};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Previews are 30 second clips; used when the track reports no duration.
const PREVIEW_LENGTH_MS: u64 = 30_000;

#[derive(Default)]
struct Clock {
    loaded: bool,
    /// Position accumulated before the current run.
    offset_ms: u64,
    started_at: Option<Instant>,
    length_ms: u64,
    ended: bool,
}

impl Clock {
    fn position_ms(&self) -> u64 {
        let running = self
            .started_at
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.offset_ms + running).min(self.length_ms)
    }
}

/// An output that plays nothing but keeps time like a real one, so position
/// polling and end-of-clip handling behave the same without a sound device.
pub struct SilentOutput {
    clock: Mutex<Clock>,
    events: AudioEventSender,
}

impl SilentOutput {
    pub fn new(events: AudioEventSender) -> Self {
        Self {
            clock: Mutex::new(Clock::default()),
            events,
        }
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: AudioEvent) {
        let _ = self.events.send(event);
    }
}

impl AudioOutput for SilentOutput {
    fn load(&self, url: &str, duration_ms: u64) -> AppResult<()> {
        if url.is_empty() {
            return Err(AppError::LocalPlayback("empty source url".into()));
        }
        log::debug!("[SilentOutput::load] {}", url);
        let length_ms = if duration_ms == 0 {
            PREVIEW_LENGTH_MS
        } else {
            duration_ms.min(PREVIEW_LENGTH_MS)
        };
        *self.clock() = Clock {
            loaded: true,
            offset_ms: 0,
            started_at: Some(Instant::now()),
            length_ms,
            ended: false,
        };
        self.emit(AudioEvent::Playing);
        Ok(())
    }

    fn play(&self) -> AppResult<()> {
        let mut clock = self.clock();
        if !clock.loaded {
            return Err(AppError::LocalPlayback("nothing loaded".into()));
        }
        if clock.ended {
            clock.offset_ms = 0;
            clock.ended = false;
        }
        if clock.started_at.is_none() {
            clock.started_at = Some(Instant::now());
        }
        drop(clock);
        self.emit(AudioEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        let mut clock = self.clock();
        if let Some(start) = clock.started_at.take() {
            clock.offset_ms =
                (clock.offset_ms + start.elapsed().as_millis() as u64).min(clock.length_ms);
            drop(clock);
            self.emit(AudioEvent::Paused);
        }
    }

    fn stop(&self) {
        *self.clock() = Clock::default();
    }

    fn seek(&self, position_ms: u64) {
        let mut clock = self.clock();
        clock.offset_ms = position_ms.min(clock.length_ms);
        clock.ended = false;
        if clock.started_at.is_some() {
            clock.started_at = Some(Instant::now());
        }
    }

    fn set_volume(&self, _volume: f32) {}

    fn position_ms(&self) -> u64 {
        let mut clock = self.clock();
        let position = clock.position_ms();
        if clock.loaded && !clock.ended && clock.started_at.is_some() && position >= clock.length_ms {
            clock.ended = true;
            clock.offset_ms = clock.length_ms;
            clock.started_at = None;
            drop(clock);
            self.emit(AudioEvent::Ended);
        }
        position
    }
}

impl SilentOutput {
    /// Moves the clock forward without waiting; lets callers fast-forward a
    /// clip, e.g. when skipping through previews.
    pub fn advance(&self, by: Duration) {
        let mut clock = self.clock();
        let target = clock.position_ms() + by.as_millis() as u64;
        clock.offset_ms = target.min(clock.length_ms);
        if clock.started_at.is_some() {
            clock.started_at = Some(Instant::now());
        }
    }
}
