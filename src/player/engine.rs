use crate::api::client::SpotifyClient;
use crate::api::models::{RemotePlaybackState, Track};
use crate::api::player::PlayRequest;
use crate::audio::{AudioEvent, AudioOutput, LocalAudio};
use crate::config::AppConfig;
use crate::device::DeviceResolver;
use crate::error::{AppError, AppResult, ErrorInfo};
use crate::events::{
    EventSender, PlayerEvent, ProgressPayload, QueueChangedPayload, StateChangedPayload,
    TrackChangedPayload,
};
use crate::player::sdk::{SdkEvent, SdkPlayerState};
use crate::player::state::{
    ContextKind, PlaybackContext, PlaybackSource, PlaybackState, RepeatMode,
};
use crate::session::SessionManager;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Where a control operation (pause, skip, seek) is sent.
#[derive(Debug, Clone, PartialEq)]
enum ControlTarget {
    Local,
    Remote(String),
}

/// The playback state machine. Every mutation of [`PlaybackState`] goes
/// through here and is published on a watch channel.
pub struct PlaybackEngine {
    client: Arc<SpotifyClient>,
    session: Arc<SessionManager>,
    devices: Arc<DeviceResolver>,
    audio: LocalAudio,
    state: watch::Sender<PlaybackState>,
    events: EventSender,
    /// Last operation number handed out.
    issued: AtomicU64,
    /// Newest operation whose result was committed. Only written while the
    /// watch lock is held.
    settled: AtomicU64,
    in_flight: AtomicUsize,
    context_queue_limit: usize,
    auto_advance: bool,
}

/// Clears `is_loading` once the last in-flight operation finishes, however
/// it finishes.
struct LoadingGuard<'a> {
    engine: &'a PlaybackEngine,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.engine.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.engine.sync_loading();
    }
}

impl PlaybackEngine {
    pub fn new(
        client: Arc<SpotifyClient>,
        devices: Arc<DeviceResolver>,
        output: Arc<dyn AudioOutput>,
        config: &AppConfig,
        events: EventSender,
    ) -> Self {
        let initial = PlaybackState::new(config.initial_volume(), config.history_limit);
        output.set_volume(initial.volume);
        let (state, _) = watch::channel(initial);

        Self {
            session: Arc::clone(client.session()),
            client,
            devices,
            audio: LocalAudio::new(output),
            state,
            events,
            issued: AtomicU64::new(0),
            settled: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            context_queue_limit: config.context_queue_limit.max(1),
            auto_advance: config.auto_advance,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    // ---- bookkeeping ----

    fn next_op(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_superseded(&self, op: u64) -> bool {
        self.settled.load(Ordering::SeqCst) > op
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.sync_loading();
        LoadingGuard { engine: self }
    }

    fn sync_loading(&self) {
        let changed = self.state.send_if_modified(|state| {
            let loading = self.in_flight.load(Ordering::SeqCst) > 0;
            if state.is_loading == loading {
                false
            } else {
                state.is_loading = loading;
                true
            }
        });
        if changed {
            self.notify_status();
        }
    }

    fn update(&self, f: impl FnOnce(&mut PlaybackState)) {
        self.state.send_modify(f);
    }

    /// Applies the result of operation `op` unless a newer operation has
    /// already committed.
    fn commit(&self, op: u64, f: impl FnOnce(&mut PlaybackState)) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.settled.load(Ordering::SeqCst) > op {
                return false;
            }
            self.settled.store(op, Ordering::SeqCst);
            f(state);
            applied = true;
            true
        });
        if !applied {
            log::info!("[commit] Operation {} superseded, result dropped", op);
        }
        applied
    }

    fn emit(&self, event: PlayerEvent) {
        let _ = self.events.send(event);
    }

    fn notify_status(&self) {
        let status = self.state.borrow().status();
        self.emit(PlayerEvent::StateChanged(StateChangedPayload { status }));
    }

    fn notify_queue(&self) {
        let payload = {
            let state = self.state.borrow();
            QueueChangedPayload {
                queue_len: state.queue.upcoming().len(),
                history_len: state.queue.history().len(),
            }
        };
        self.emit(PlayerEvent::QueueChanged(payload));
    }

    fn notify_track(&self) {
        let payload = {
            let state = self.state.borrow();
            state
                .current_track
                .as_ref()
                .map(|track| TrackChangedPayload::new(track, state.source))
        };
        if let Some(payload) = payload {
            self.emit(PlayerEvent::TrackChanged(payload));
        }
    }

    /// Writes `err` to `last_error` and the event channel, then hands it back.
    fn report(&self, err: AppError) -> AppError {
        log::warn!("[report] {}", err);
        let info = ErrorInfo::from(&err);
        self.update(|state| state.last_error = Some(info.clone()));
        self.emit(PlayerEvent::Error(info));
        err
    }

    /// Like [`report`](Self::report), but silent for superseded operations.
    fn fail(&self, op: u64, err: AppError) -> AppError {
        if self.is_superseded(op) {
            log::info!("[fail] Superseded operation {} failed: {}", op, err);
            return err;
        }
        self.report(err)
    }

    fn remote_device(&self) -> Option<String> {
        if self.session.is_premium() {
            self.devices.current_device_id()
        } else {
            None
        }
    }

    /// Local audio wins whenever it is the active source; otherwise premium
    /// accounts drive the remote device.
    fn control_target(&self) -> AppResult<ControlTarget> {
        if self.state.borrow().source == PlaybackSource::Local || !self.session.is_premium() {
            return Ok(ControlTarget::Local);
        }
        self.devices
            .current_device_id()
            .map(ControlTarget::Remote)
            .ok_or(AppError::NoDeviceAvailable)
    }

    /// Makes `track` current for operation `op`, pushing the previous track
    /// to history.
    fn commit_track(
        &self,
        op: u64,
        track: Track,
        context: PlaybackContext,
        source: PlaybackSource,
        upcoming: Option<Vec<Track>>,
    ) -> bool {
        let mut previous_source = PlaybackSource::None;
        let queue_changed = upcoming.is_some();
        let applied = self.commit(op, |state| {
            previous_source = state.source;
            if let Some(previous) = state.current_track.take() {
                state.queue.push_history(previous);
            }
            if let Some(upcoming) = upcoming {
                state.queue.set_upcoming(upcoming);
            }
            state.begin_track(track, context, source);
            state.last_error = None;
        });

        if applied {
            if previous_source == PlaybackSource::Local && source == PlaybackSource::Remote {
                self.audio.stop();
            }
            self.notify_track();
            self.notify_status();
            if queue_changed {
                self.notify_queue();
            }
        }
        applied
    }

    // ---- initiating operations ----

    /// Plays one track, on the remote device when possible and as a local
    /// preview otherwise.
    pub async fn play_track(&self, track: Track, context: Option<PlaybackContext>) -> AppResult<()> {
        let op = self.next_op();
        let _loading = self.begin_loading();
        log::info!("[play_track] op={} track={} ({})", op, track.id, track.name);

        let context = context.unwrap_or_else(|| PlaybackContext::track(&track.id));
        self.play_track_op(op, track, context)
            .await
            .map_err(|e| self.fail(op, e))
    }

    async fn play_track_op(&self, op: u64, track: Track, context: PlaybackContext) -> AppResult<()> {
        if !self.session.is_premium() {
            return self.play_local(op, track, context, None);
        }

        match self.devices.current_device_id() {
            Some(device_id) => {
                let request = PlayRequest::uris(vec![track.uri.clone()]);
                match self.client.start_playback(Some(&device_id), &request).await {
                    Ok(()) => {
                        self.commit_track(op, track, context, PlaybackSource::Remote, None);
                        return Ok(());
                    }
                    Err(e) => log::warn!("[play_track] Remote play failed, trying preview: {}", e),
                }
            }
            None => log::info!("[play_track] No device known, trying preview"),
        }

        self.play_local(op, track, context, None)
            .map_err(|e| match e {
                AppError::NoPreviewAvailable => AppError::NoPlaybackSource,
                other => other,
            })
    }

    fn play_local(
        &self,
        op: u64,
        track: Track,
        context: PlaybackContext,
        upcoming: Option<Vec<Track>>,
    ) -> AppResult<()> {
        if !track.has_preview() {
            return Err(AppError::NoPreviewAvailable);
        }
        if self.is_superseded(op) {
            log::info!("[play_local] Operation {} superseded before audio start", op);
            return Ok(());
        }
        self.audio.start(&track)?;
        self.commit_track(op, track, context, PlaybackSource::Local, upcoming);
        Ok(())
    }

    /// Plays a whole container. `tracks` is required for `collection` and
    /// optional for `track`.
    pub async fn play_context(
        &self,
        kind: ContextKind,
        id: &str,
        tracks: Option<Vec<Track>>,
    ) -> AppResult<()> {
        let op = self.next_op();
        log::info!("[play_context] op={} {}:{}", op, kind.as_str(), id);

        let empty = tracks.as_ref().map_or(true, Vec::is_empty);
        if (kind == ContextKind::Collection && empty) || kind == ContextKind::None {
            return Err(self.fail(op, AppError::EmptyCollection));
        }

        let _loading = self.begin_loading();
        let context = PlaybackContext::new(kind, id);
        self.play_context_op(op, context, tracks.unwrap_or_default())
            .await
            .map_err(|e| self.fail(op, e))
    }

    async fn play_context_op(
        &self,
        op: u64,
        context: PlaybackContext,
        tracks: Vec<Track>,
    ) -> AppResult<()> {
        let id = context.id.clone().unwrap_or_default();

        match context.kind {
            ContextKind::Track => {
                let track = match tracks.into_iter().next() {
                    Some(track) => track,
                    None => self.client.get_track(&id).await?,
                };
                self.play_track_op(op, track, context).await
            }
            ContextKind::Collection => {
                if let Some(device_id) = self.remote_device() {
                    match self.start_uri_list(&device_id, &tracks).await {
                        Ok(()) => {
                            self.commit_remote_list(op, context, tracks);
                            return Ok(());
                        }
                        Err(e) => log::warn!("[play_context] Remote play failed: {}", e),
                    }
                }
                self.play_local_list(op, context, tracks)
            }
            ContextKind::Album | ContextKind::Playlist => {
                if let (Some(device_id), Some(uri)) = (self.remote_device(), context.remote_uri()) {
                    let request = PlayRequest::context(uri, None);
                    match self.client.start_playback(Some(&device_id), &request).await {
                        Ok(()) => {
                            self.commit_remote_context(op, context).await;
                            return Ok(());
                        }
                        Err(e) => log::warn!("[play_context] Remote context play failed: {}", e),
                    }
                }
                let tracks = self.fetch_context_tracks(&context).await?;
                self.play_local_list(op, context, tracks)
            }
            ContextKind::Artist => {
                // No remote context exists for top tracks; send them as URIs.
                let mut top_tracks = None;
                if let Some(device_id) = self.remote_device() {
                    match self.client.get_artist_top_tracks(&id).await {
                        Ok(tracks) if !tracks.is_empty() => {
                            match self.start_uri_list(&device_id, &tracks).await {
                                Ok(()) => {
                                    self.commit_remote_list(op, context, tracks);
                                    return Ok(());
                                }
                                Err(e) => {
                                    log::warn!("[play_context] Remote artist play failed: {}", e)
                                }
                            }
                            top_tracks = Some(tracks);
                        }
                        Ok(_) => top_tracks = Some(Vec::new()),
                        Err(e) => log::warn!("[play_context] Artist top tracks failed: {}", e),
                    }
                }
                let tracks = match top_tracks {
                    Some(tracks) => tracks,
                    None => self.fetch_context_tracks(&context).await?,
                };
                self.play_local_list(op, context, tracks)
            }
            ContextKind::None => Err(AppError::EmptyCollection),
        }
    }

    /// Sends at most `context_queue_limit` URIs as an explicit play queue.
    async fn start_uri_list(&self, device_id: &str, tracks: &[Track]) -> AppResult<()> {
        let uris: Vec<String> = tracks
            .iter()
            .take(self.context_queue_limit)
            .map(|t| t.uri.clone())
            .collect();
        self.client
            .start_playback(Some(device_id), &PlayRequest::uris(uris))
            .await
    }

    /// Mirrors the URI list sent by [`start_uri_list`](Self::start_uri_list):
    /// the upcoming queue holds only what the device was given.
    fn commit_remote_list(&self, op: u64, context: PlaybackContext, mut tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        tracks.truncate(self.context_queue_limit);
        let first = tracks.remove(0);
        self.commit_track(op, first, context, PlaybackSource::Remote, Some(tracks));
    }

    /// The remote device picked the starting track itself; ask it which one.
    /// Without an answer, the context's first track is assumed.
    async fn commit_remote_context(&self, op: u64, context: PlaybackContext) {
        let remote = match self.client.get_playback_state().await {
            Ok(remote) => remote,
            Err(e) => {
                log::debug!("[play_context] Could not read remote state: {}", e);
                None
            }
        };

        if let Some((item, progress)) = remote.and_then(|r| r.item.map(|item| (item, r.progress_ms))) {
            if self.commit_track(op, item, context, PlaybackSource::Remote, Some(Vec::new())) {
                self.update(|state| state.set_position(progress.unwrap_or(0)));
            }
            return;
        }

        let first = match self.fetch_context_tracks(&context).await {
            Ok(tracks) => tracks.into_iter().next(),
            Err(e) => {
                log::debug!("[play_context] Could not list context tracks: {}", e);
                None
            }
        };
        if let Some(first) = first {
            self.commit_track(op, first, context, PlaybackSource::Remote, Some(Vec::new()));
            return;
        }

        // Track unknown until the device reports its state.
        let mut previous_source = PlaybackSource::None;
        let applied = self.commit(op, |state| {
            previous_source = state.source;
            if let Some(previous) = state.current_track.take() {
                state.queue.push_history(previous);
            }
            state.queue.set_upcoming(Vec::new());
            state.context = context;
            state.source = PlaybackSource::Remote;
            state.is_playing = false;
            state.position_ms = 0;
            state.duration_ms = 0;
            state.last_error = None;
        });
        if applied {
            if previous_source == PlaybackSource::Local {
                self.audio.stop();
            }
            self.notify_status();
            self.notify_queue();
        }
    }

    async fn fetch_context_tracks(&self, context: &PlaybackContext) -> AppResult<Vec<Track>> {
        let id = context.id.as_deref().unwrap_or_default();
        match context.kind {
            ContextKind::Album => self.client.get_album_tracks(id).await,
            ContextKind::Playlist => self.client.get_playlist_tracks(id).await,
            ContextKind::Artist => self.client.get_artist_top_tracks(id).await,
            ContextKind::Track => Ok(vec![self.client.get_track(id).await?]),
            ContextKind::Collection | ContextKind::None => Ok(Vec::new()),
        }
    }

    fn play_local_list(
        &self,
        op: u64,
        context: PlaybackContext,
        tracks: Vec<Track>,
    ) -> AppResult<()> {
        let mut playable: Vec<Track> = tracks.into_iter().filter(Track::has_preview).collect();
        if playable.is_empty() {
            return Err(AppError::NoPreviewAvailable);
        }
        let first = playable.remove(0);
        log::info!(
            "[play_local_list] {} previews, starting with {}",
            playable.len() + 1,
            first.id
        );
        self.play_local(op, first, context, Some(playable))
    }

    // ---- control operations ----

    pub async fn play_pause(&self) -> AppResult<()> {
        self.play_pause_op().await.map_err(|e| self.report(e))
    }

    async fn play_pause_op(&self) -> AppResult<()> {
        let (was_playing, has_track) = {
            let state = self.state.borrow();
            (state.is_playing, state.current_track.is_some())
        };

        match self.control_target()? {
            ControlTarget::Local => {
                if !has_track {
                    return Ok(());
                }
                if was_playing {
                    self.audio.pause();
                } else {
                    self.audio.resume()?;
                }
            }
            ControlTarget::Remote(device_id) => {
                if was_playing {
                    self.client.pause_playback(Some(&device_id)).await?;
                } else {
                    self.client.resume_playback(Some(&device_id)).await?;
                }
            }
        }

        self.update(|state| {
            state.set_playing(!was_playing);
            state.last_error = None;
        });
        self.notify_status();
        Ok(())
    }

    pub async fn next_track(&self) -> AppResult<()> {
        self.skip(true).await.map_err(|e| self.report(e))
    }

    pub async fn previous_track(&self) -> AppResult<()> {
        self.skip(false).await.map_err(|e| self.report(e))
    }

    async fn skip(&self, forward: bool) -> AppResult<()> {
        match self.control_target()? {
            ControlTarget::Remote(device_id) => {
                if forward {
                    self.client.skip_to_next(Some(&device_id)).await?;
                } else {
                    self.client.skip_to_previous(Some(&device_id)).await?;
                }
                self.update(|state| state.last_error = None);
                Ok(())
            }
            ControlTarget::Local => self.skip_local(forward),
        }
    }

    fn skip_local(&self, forward: bool) -> AppResult<()> {
        let target = {
            let state = self.state.borrow();
            if forward {
                state.queue.upcoming().front().cloned()
            } else {
                state.queue.history().back().cloned()
            }
        };
        let Some(target) = target else {
            log::debug!("[skip_local] Nothing to skip to");
            return Ok(());
        };

        let op = self.next_op();
        self.audio.start(&target)?;

        let applied = self.commit(op, |state| {
            let current = state.current_track.take();
            let moved = if forward {
                state.queue.advance(current.clone())
            } else {
                state.queue.retreat(current.clone())
            };
            match moved {
                Some(track) => {
                    let context = state.context.clone();
                    state.begin_track(track, context, PlaybackSource::Local);
                    state.last_error = None;
                }
                None => state.current_track = current,
            }
        });
        if applied {
            self.notify_track();
            self.notify_status();
            self.notify_queue();
        }
        Ok(())
    }

    /// Flips shuffle. A failed remote update is reported but the local flag
    /// stays as the user set it.
    pub async fn toggle_shuffle(&self) -> AppResult<bool> {
        let mut shuffled = false;
        self.update(|state| {
            state.is_shuffled = !state.is_shuffled;
            shuffled = state.is_shuffled;
            if shuffled {
                state.queue.shuffle();
            } else {
                state.queue.unshuffle();
            }
        });
        self.notify_queue();
        log::info!("[toggle_shuffle] {}", shuffled);

        if let Ok(ControlTarget::Remote(device_id)) = self.control_target() {
            if let Err(e) = self.client.set_shuffle(shuffled, Some(&device_id)).await {
                return Err(self.report(e));
            }
        }
        Ok(shuffled)
    }

    /// Cycles off -> track -> context. Never fails; the remote update runs in
    /// the background and its failures are only logged.
    pub fn toggle_repeat_mode(&self) -> RepeatMode {
        let mut mode = RepeatMode::Off;
        self.update(|state| {
            state.repeat_mode = state.repeat_mode.next();
            mode = state.repeat_mode;
        });
        log::info!("[toggle_repeat_mode] {}", mode.as_str());

        if let Ok(ControlTarget::Remote(device_id)) = self.control_target() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let client = Arc::clone(&self.client);
                    runtime.spawn(async move {
                        if let Err(e) = client.set_repeat(mode.as_str(), Some(&device_id)).await {
                            log::warn!("[toggle_repeat_mode] Remote repeat update failed: {}", e);
                        }
                    });
                }
                Err(_) => log::warn!("[toggle_repeat_mode] No runtime, remote not updated"),
            }
        }
        mode
    }

    pub fn add_to_queue(&self, track: Track) {
        log::info!("[add_to_queue] {}", track.id);
        self.update(|state| state.queue.enqueue(track));
        self.notify_queue();
    }

    pub async fn set_volume(&self, volume: f32) {
        if !volume.is_finite() {
            log::warn!("[set_volume] Ignoring non-finite volume {}", volume);
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.update(|state| state.volume = volume);
        self.audio.set_volume(volume);

        if let Ok(ControlTarget::Remote(device_id)) = self.control_target() {
            let percent = (volume * 100.0).round() as u8;
            if let Err(e) = self.client.set_remote_volume(percent, Some(&device_id)).await {
                log::warn!("[set_volume] Remote volume update failed: {}", e);
            }
        }
    }

    pub async fn seek(&self, position_ms: u64) -> AppResult<()> {
        self.seek_op(position_ms).await.map_err(|e| self.report(e))
    }

    async fn seek_op(&self, position_ms: u64) -> AppResult<()> {
        let position_ms = {
            let state = self.state.borrow();
            if state.current_track.is_none() {
                return Ok(());
            }
            position_ms.min(state.duration_ms)
        };

        match self.control_target()? {
            ControlTarget::Local => self.audio.seek(position_ms),
            ControlTarget::Remote(device_id) => {
                self.client.seek_remote(position_ms, Some(&device_id)).await?
            }
        }
        self.update(|state| state.set_position(position_ms));
        self.emit_progress();
        Ok(())
    }

    pub fn clear_error(&self) {
        self.update(|state| state.last_error = None);
    }

    /// Stops local audio and returns to `Idle`. Results of operations still
    /// in flight are discarded.
    pub fn reset(&self) {
        self.audio.stop();
        self.state.send_modify(|state| {
            self.settled
                .store(self.issued.load(Ordering::SeqCst), Ordering::SeqCst);
            state.clear_playback();
            state.last_error = None;
        });
        log::info!("[reset] Player back to idle");
        self.notify_status();
        self.notify_queue();
    }

    // ---- inbound events ----

    pub async fn handle_sdk_event(&self, event: SdkEvent) {
        match event {
            SdkEvent::Ready { device_id } => {
                let outcome = self.devices.on_device_ready(&device_id).await;
                log::info!("[sdk] ready {} -> {:?}", device_id, outcome);
            }
            SdkEvent::NotReady { device_id } => {
                log::warn!("[sdk] device {} went offline", device_id);
            }
            SdkEvent::StateChanged(Some(remote)) => self.apply_sdk_state(remote),
            SdkEvent::StateChanged(None) => {
                let changed = self.state.send_if_modified(|state| {
                    if state.source == PlaybackSource::Remote && state.is_playing {
                        state.is_playing = false;
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    self.notify_status();
                }
            }
            SdkEvent::Error { kind, message } => {
                self.report(AppError::PlayerSdk { kind, message });
            }
        }
    }

    fn apply_sdk_state(&self, remote: SdkPlayerState) {
        if self.state.borrow().source == PlaybackSource::Local {
            log::debug!("[sdk] Ignoring remote state while previewing locally");
            return;
        }
        self.apply_remote(remote.current_track, !remote.paused, remote.position_ms);
    }

    /// Mirrors a `GET /me/player` snapshot into the state.
    pub fn apply_remote_state(&self, remote: RemotePlaybackState) {
        if self.state.borrow().source == PlaybackSource::Local {
            return;
        }
        self.apply_remote(
            remote.item,
            remote.is_playing,
            remote.progress_ms.unwrap_or(0),
        );
    }

    fn apply_remote(&self, track: Option<Track>, playing: bool, position_ms: u64) {
        let mut track_changed = false;
        self.update(|state| {
            if let Some(track) = track {
                if state.current_track.as_ref().map(|t| &t.id) != Some(&track.id) {
                    state.duration_ms = track.duration_ms;
                    state.current_track = Some(track);
                    track_changed = true;
                }
                state.source = PlaybackSource::Remote;
            }
            state.set_playing(playing);
            state.set_position(position_ms);
        });
        if track_changed {
            self.notify_track();
        }
        self.notify_status();
        self.emit_progress();
    }

    pub async fn handle_audio_event(&self, event: AudioEvent) {
        if self.state.borrow().source != PlaybackSource::Local {
            log::debug!("[audio] Ignoring {:?}, local audio is not the source", event);
            return;
        }

        match event {
            AudioEvent::Playing => self.mirror_playing(true),
            AudioEvent::Paused => self.mirror_playing(false),
            AudioEvent::Ended => self.on_local_ended().await,
            AudioEvent::Error(message) => {
                self.mirror_playing(false);
                self.report(AppError::LocalPlayback(message));
            }
        }
    }

    fn mirror_playing(&self, playing: bool) {
        let changed = self.state.send_if_modified(|state| {
            let before = state.is_playing;
            state.set_playing(playing);
            before != state.is_playing
        });
        if changed {
            self.notify_status();
        }
    }

    async fn on_local_ended(&self) {
        let (repeat, current) = {
            let state = self.state.borrow();
            (state.repeat_mode, state.current_track.clone())
        };

        self.update(|state| {
            state.is_playing = false;
            state.position_ms = state.duration_ms;
        });
        self.notify_status();

        if repeat == RepeatMode::Track {
            if let Some(track) = current {
                match self.audio.start(&track) {
                    Ok(()) => self.update(|state| {
                        state.set_position(0);
                        state.set_playing(true);
                    }),
                    Err(e) => {
                        self.report(e);
                    }
                }
                self.notify_status();
            }
            return;
        }

        if self.auto_advance {
            let _ = self.next_track().await;
        }
    }

    /// One tick of the position poller.
    pub async fn sample_position(&self) {
        let (playing, source) = {
            let state = self.state.borrow();
            (state.is_playing, state.source)
        };
        if !playing {
            return;
        }

        match source {
            PlaybackSource::Local => {
                let position = self.audio.position_ms();
                self.update(|state| state.set_position(position));
                self.emit_progress();
            }
            PlaybackSource::Remote => match self.client.get_playback_state().await {
                Ok(Some(remote)) => self.apply_remote_state(remote),
                Ok(None) => log::debug!("[sample_position] No active remote playback"),
                Err(e) => log::debug!("[sample_position] {}", e),
            },
            PlaybackSource::None => {}
        }
    }

    fn emit_progress(&self) {
        let payload = {
            let state = self.state.borrow();
            ProgressPayload::new(state.position_ms, state.duration_ms)
        };
        self.emit(PlayerEvent::Progress(payload));
    }
}
