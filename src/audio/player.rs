use crate::audio::decoder::PreviewDecoder;
use crate::audio::{AudioEvent, AudioEventSender, AudioOutput};
use crate::error::{AppError, AppResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Sentinel value meaning "no seek requested".
const NO_SEEK: u64 = u64::MAX;
const MAX_RING_SAMPLES: usize = 176_400;

/// State of one loaded clip, shared by the decode thread, the cpal callback
/// and the controlling [`NativeOutput`].
struct Playback {
    ring: Mutex<VecDeque<f32>>,
    ring_cond: Condvar,
    decoded_all: AtomicBool,
    playing: AtomicBool,
    stop: AtomicBool,
    ended_reported: AtomicBool,
    samples_played: AtomicU64,
    sample_rate: AtomicU64,
    channels: AtomicU64,
    seek_target_ms: AtomicU64,
}

impl Playback {
    fn new() -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(88_200)),
            ring_cond: Condvar::new(),
            decoded_all: AtomicBool::new(false),
            playing: AtomicBool::new(true),
            stop: AtomicBool::new(false),
            ended_reported: AtomicBool::new(false),
            samples_played: AtomicU64::new(0),
            sample_rate: AtomicU64::new(44_100),
            channels: AtomicU64::new(2),
            seek_target_ms: AtomicU64::new(NO_SEEK),
        }
    }

    fn ring(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn samples_per_ms(&self) -> f64 {
        let sr = self.sample_rate.load(Ordering::Relaxed) as f64;
        let ch = self.channels.load(Ordering::Relaxed) as f64;
        sr * ch / 1000.0
    }

    fn position_ms(&self) -> u64 {
        let per_ms = self.samples_per_ms();
        if per_ms > 0.0 {
            (self.samples_played.load(Ordering::Relaxed) as f64 / per_ms) as u64
        } else {
            0
        }
    }

    fn is_finished(&self) -> bool {
        self.decoded_all.load(Ordering::SeqCst) && self.ring().is_empty()
    }

    fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.ring_cond.notify_all();
    }
}

/// cpal/symphonia output. Each clip is downloaded in full, then decoded on a
/// dedicated thread that also owns the cpal stream.
pub struct NativeOutput {
    http: reqwest::Client,
    volume: Arc<Mutex<f32>>,
    current: Mutex<Option<Arc<Playback>>>,
    events: AudioEventSender,
}

impl NativeOutput {
    pub fn new(events: AudioEventSender) -> AppResult<Self> {
        let host = cpal::default_host();
        if host.default_output_device().is_none() {
            return Err(AppError::LocalPlayback("No output device available".into()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            volume: Arc::new(Mutex::new(1.0)),
            current: Mutex::new(None),
            events,
        })
    }

    fn current(&self) -> Option<Arc<Playback>> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn replace(&self, next: Option<Arc<Playback>>) {
        let previous = std::mem::replace(
            &mut *self.current.lock().unwrap_or_else(|e| e.into_inner()),
            next,
        );
        if let Some(previous) = previous {
            previous.shutdown();
        }
    }
}

impl AudioOutput for NativeOutput {
    fn load(&self, url: &str, _duration_ms: u64) -> AppResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::LocalPlayback(format!("No async runtime: {}", e)))?;

        let playback = Arc::new(Playback::new());
        self.replace(Some(Arc::clone(&playback)));

        let http = self.http.clone();
        let url = url.to_string();
        let volume = Arc::clone(&self.volume);
        let events = self.events.clone();

        runtime.spawn(async move {
            let bytes = match download(&http, &url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::error!("[NativeOutput::load] {}", e);
                    let _ = events.send(AudioEvent::Error(e.to_string()));
                    return;
                }
            };
            if playback.stop.load(Ordering::SeqCst) {
                return;
            }
            std::thread::spawn(move || {
                if let Err(e) = run_clip(bytes, &playback, &volume) {
                    log::error!("[NativeOutput] Playback failed: {}", e);
                    let _ = events.send(AudioEvent::Error(e.to_string()));
                }
            });
        });

        let _ = self.events.send(AudioEvent::Playing);
        Ok(())
    }

    fn play(&self) -> AppResult<()> {
        let playback = self
            .current()
            .ok_or_else(|| AppError::LocalPlayback("nothing loaded".into()))?;
        playback.playing.store(true, Ordering::SeqCst);
        let _ = self.events.send(AudioEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        if let Some(playback) = self.current() {
            playback.playing.store(false, Ordering::SeqCst);
            let _ = self.events.send(AudioEvent::Paused);
        }
    }

    fn stop(&self) {
        self.replace(None);
    }

    fn seek(&self, position_ms: u64) {
        if let Some(playback) = self.current() {
            playback.seek_target_ms.store(position_ms, Ordering::SeqCst);
            playback.ring_cond.notify_all();
            let samples = (position_ms as f64 * playback.samples_per_ms()) as u64;
            playback.samples_played.store(samples, Ordering::SeqCst);
        }
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock().unwrap_or_else(|e| e.into_inner()) = volume.clamp(0.0, 1.0);
    }

    fn position_ms(&self) -> u64 {
        let Some(playback) = self.current() else {
            return 0;
        };
        if playback.playing.load(Ordering::SeqCst)
            && playback.is_finished()
            && !playback.ended_reported.swap(true, Ordering::SeqCst)
        {
            playback.playing.store(false, Ordering::SeqCst);
            let _ = self.events.send(AudioEvent::Ended);
        }
        playback.position_ms()
    }
}

impl Drop for NativeOutput {
    fn drop(&mut self) {
        self.replace(None);
    }
}

async fn download(http: &reqwest::Client, url: &str) -> AppResult<Vec<u8>> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::LocalPlayback(format!(
            "Preview download failed: HTTP {}",
            status
        )));
    }
    let bytes = response.bytes().await?;
    log::debug!("[download] {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Decode loop for one clip. Runs on its own thread; the cpal stream lives
/// and dies here.
fn run_clip(bytes: Vec<u8>, playback: &Arc<Playback>, volume: &Arc<Mutex<f32>>) -> AppResult<()> {
    let mut decoder = PreviewDecoder::new(bytes)?;
    let sr = decoder.sample_rate();
    let ch = decoder.channels();
    playback.sample_rate.store(sr as u64, Ordering::SeqCst);
    playback.channels.store(ch as u64, Ordering::SeqCst);

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AppError::LocalPlayback("No output device available".into()))?;

    let stream_config = cpal::StreamConfig {
        channels: ch as u16,
        sample_rate: cpal::SampleRate(sr),
        buffer_size: cpal::BufferSize::Default,
    };

    let callback_playback = Arc::clone(playback);
    let callback_volume = Arc::clone(volume);
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !callback_playback.playing.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }

                let vol = *callback_volume.lock().unwrap_or_else(|e| e.into_inner());
                let mut ring = callback_playback.ring();
                let available = ring.len().min(data.len());
                for (i, sample) in data.iter_mut().enumerate() {
                    *sample = if i < available {
                        ring.pop_front().unwrap_or(0.0) * vol
                    } else {
                        0.0
                    };
                }
                drop(ring);

                callback_playback
                    .samples_played
                    .fetch_add(available as u64, Ordering::Relaxed);
                callback_playback.ring_cond.notify_all();
            },
            |err| log::error!("cpal output error: {}", err),
            None,
        )
        .map_err(|e| AppError::LocalPlayback(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AppError::LocalPlayback(format!("Failed to start playback: {}", e)))?;

    loop {
        if playback.stop.load(Ordering::Relaxed) {
            break;
        }

        let pending_seek = playback.seek_target_ms.swap(NO_SEEK, Ordering::SeqCst);
        if pending_seek != NO_SEEK {
            playback.ring().clear();
            playback.decoded_all.store(false, Ordering::SeqCst);
            if let Err(e) = decoder.seek(pending_seek) {
                log::warn!("[run_clip] {}", e);
            }
            continue;
        }

        if playback.decoded_all.load(Ordering::SeqCst) {
            // Keep the stream alive until the ring drains or we are stopped.
            if playback.ring().is_empty() && playback.ended_reported.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
            continue;
        }

        {
            let mut ring = playback.ring();
            while ring.len() >= MAX_RING_SAMPLES
                && !playback.stop.load(Ordering::Relaxed)
                && playback.seek_target_ms.load(Ordering::Relaxed) == NO_SEEK
            {
                ring = playback
                    .ring_cond
                    .wait(ring)
                    .unwrap_or_else(|e| e.into_inner());
            }
        }

        if playback.stop.load(Ordering::Relaxed) {
            break;
        }
        if playback.seek_target_ms.load(Ordering::Relaxed) != NO_SEEK {
            continue;
        }

        match decoder.decode_next()? {
            Some(samples) => {
                playback.ring().extend(samples);
                playback.ring_cond.notify_all();
            }
            None => playback.decoded_all.store(true, Ordering::SeqCst),
        }
    }

    drop(stream);
    Ok(())
}
