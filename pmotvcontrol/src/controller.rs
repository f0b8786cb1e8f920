//! The playback controller: one per client.
//!
//! The authority drives its backend and writes the [`PlaybackRecord`];
//! followers observe the record and reconcile their own backend against it.
//! Everything runs on the caller's thread: the host feeds backend events and
//! replicated updates in, and calls [`PlaybackController::tick`] once per
//! frame to run deferred work, reconciliation, tracking and the coalesced
//! publish.
//!
//! State machine: `Stopped → Loading → Playing → {Stopped | Error}`, with
//! `Error` going back to `Loading` (retry), to the next source URL (advance)
//! or to `Stopped`.

use std::mem;

use pmotvsource::{
    MediaErrorCode, MediaUrl, Revision, Source, SourceDecision, SourceManager, UrlSource,
};
use tracing::{debug, info, warn};

use crate::backend::{BackendEvent, MediaBackend};
use crate::context::AuthorityContext;
use crate::errors::{ControllerError, Result};
use crate::events::{PlayerEvent, PlayerEventBus};
use crate::model::{BackendKind, PlayerState, RepeatMode, ScreenFit};
use crate::record::{PlaybackRecord, ReplicatedUpdate};
use crate::scheduler::{Delay, Scheduler};
use crate::settings::PlayerSettings;
use crate::sync::{self, StallDetector, SyncAction};
use crate::url;

/// Deferred work. Each task re-checks at fire time that the video it was
/// scheduled for is still the active one.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Task {
    /// Authority: reload the current media as a new video.
    RestartCurrent { video_number: u64 },
    /// Authority: run the advance algorithm.
    PlayNext { video_number: u64 },
    /// Follower: reload the current record locally after an error.
    RetryLocal { video_number: u64 },
    /// Follower: ask for the record if none arrived yet.
    OwnershipSync,
}

pub struct PlaybackController<B: MediaBackend> {
    ctx: AuthorityContext,
    backend: B,
    sources: SourceManager,
    settings: PlayerSettings,
    bus: PlayerEventBus,
    scheduler: Scheduler<Task>,

    // Replicated
    record: PlaybackRecord,
    record_dirty: bool,
    sources_dirty: bool,
    record_received: bool,
    was_owner: bool,
    /// Highest authority epoch seen on the wire, applied or not.
    epoch_seen: u64,

    // Local
    state: PlayerState,
    last_error: Option<MediaErrorCode>,
    loaded_video_number: u64,
    load_issued: Option<u64>,
    video_ready: bool,
    seekable: bool,
    wait_for_sync: bool,
    pending_load_time: f64,
    target_offset: f64,
    active_kind: BackendKind,
    kind_auto: bool,
    fallback_used: bool,
    local_retries: u32,
    stall: StallDetector,
    last_sync_time: f64,
    last_tracking_time: f64,
    track_position: f64,
    track_duration: f64,
    track_target: f64,
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(
        ctx: AuthorityContext,
        backend: B,
        sources: SourceManager,
        settings: PlayerSettings,
    ) -> Self {
        let now = ctx.now();
        let is_owner = ctx.is_owner();
        let mut record = PlaybackRecord {
            repeat_mode: settings.repeat_mode,
            hold_videos: settings.hold_videos,
            ..Default::default()
        };
        if is_owner {
            record.epoch = 1;
            record.publisher = Some(ctx.local_player());
        }
        let epoch = record.epoch;
        let mut scheduler = Scheduler::new();
        scheduler.schedule(
            now,
            Delay::Seconds(settings.ownership_sync_timeout),
            Task::OwnershipSync,
        );

        Self {
            ctx,
            backend,
            sources,
            settings,
            bus: PlayerEventBus::new(),
            scheduler,
            record,
            record_dirty: is_owner,
            sources_dirty: is_owner,
            record_received: false,
            was_owner: is_owner,
            epoch_seen: epoch,
            state: PlayerState::Stopped,
            last_error: None,
            loaded_video_number: 0,
            load_issued: None,
            video_ready: false,
            seekable: false,
            wait_for_sync: false,
            pending_load_time: 0.0,
            target_offset: 0.0,
            active_kind: BackendKind::default(),
            kind_auto: true,
            fallback_used: false,
            local_retries: 0,
            stall: StallDetector::default(),
            last_sync_time: now,
            last_tracking_time: now,
            track_position: 0.0,
            track_duration: 0.0,
            track_target: 0.0,
        }
    }

    // =====================================================================
    //  Accessors
    // =====================================================================

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn record(&self) -> &PlaybackRecord {
        &self.record
    }

    /// Last backend error, kept until the next successful ready.
    pub fn last_error(&self) -> Option<MediaErrorCode> {
        self.last_error
    }

    pub fn is_owner(&self) -> bool {
        self.ctx.is_owner()
    }

    pub fn is_video_ready(&self) -> bool {
        self.video_ready
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn is_waiting_for_sync(&self) -> bool {
        self.wait_for_sync
    }

    /// Deadline of a deferred (re)load, 0 when none is pending.
    pub fn pending_load_time(&self) -> f64 {
        self.pending_load_time
    }

    pub fn loaded_video_number(&self) -> u64 {
        self.loaded_video_number
    }

    pub fn active_backend_kind(&self) -> BackendKind {
        self.active_kind
    }

    pub fn track_position(&self) -> f64 {
        self.track_position
    }

    pub fn track_duration(&self) -> f64 {
        self.track_duration
    }

    /// Clock-derived position computed by the last reconciliation pass.
    pub fn track_target(&self) -> f64 {
        self.track_target
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn sources(&self) -> &SourceManager {
        &self.sources
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn events(&self) -> &PlayerEventBus {
        &self.bus
    }

    fn emit(&self, event: PlayerEvent) {
        self.bus.broadcast(event);
    }

    fn mark_dirty(&mut self) {
        self.record_dirty = true;
    }

    fn player(&self) -> u32 {
        self.ctx.local_player().0
    }

    // =====================================================================
    //  Ownership
    // =====================================================================

    /// Would [`PlaybackController::take_control`] be allowed?
    pub fn can_take_control(&self, override_lock: bool) -> bool {
        self.ctx.is_owner() || override_lock || !self.record.locked || self.ctx.is_authorized()
    }

    /// Becomes the authority if allowed. `override_lock` is for transitions
    /// made on behalf of the session (loop, advance, queue consumption).
    pub fn take_control(&self, override_lock: bool) -> bool {
        if self.ctx.is_owner() {
            return true;
        }
        if !self.can_take_control(override_lock) {
            debug!(player = self.player(), "Ownership denied: session locked");
            return false;
        }
        let granted = self.ctx.ownership.request_ownership();
        if granted {
            info!(player = self.player(), "Took control of the session");
        }
        granted
    }

    /// Ensures authority; returns the `video_number` increment to use (1 if
    /// already owner, 2 if ownership had to be taken).
    fn acquire(&self, override_lock: bool) -> Result<u64> {
        if self.ctx.is_owner() {
            Ok(1)
        } else if self.take_control(override_lock) {
            Ok(2)
        } else {
            Err(ControllerError::OwnershipDenied)
        }
    }

    fn check_ownership(&mut self) {
        let owner = self.ctx.is_owner();
        if owner == self.was_owner {
            return;
        }
        self.was_owner = owner;
        if owner {
            self.record.epoch = self.epoch_seen.max(self.record.epoch) + 1;
            self.epoch_seen = self.record.epoch;
            self.record.publisher = Some(self.ctx.local_player());
            self.record.revision = Revision::default();
            info!(
                player = self.player(),
                epoch = self.record.epoch,
                video_number = self.record.video_number,
                "Now the session authority"
            );
            self.record_dirty = true;
            self.sources_dirty = true;
        } else {
            info!(player = self.player(), "No longer the session authority");
        }
        self.emit(PlayerEvent::InfoUpdate);
    }

    // =====================================================================
    //  Loading
    // =====================================================================

    /// Starts the source chain if nothing is loading or playing.
    pub fn trigger_play(&mut self) -> Result<()> {
        if self.state.is_active() {
            return Ok(());
        }
        let increment = self.acquire(false)?;
        let (media, index) = self
            .sources
            .take_ready_url()
            .ok_or(ControllerError::NothingToPlay)?;
        self.sources_dirty = true;
        self.load_new_video(media, Some(index), increment)
    }

    /// Session start: plays the source chain when autoplay is on and this
    /// client is the authority.
    pub fn start(&mut self) -> Result<()> {
        if self.settings.autoplay && self.ctx.is_owner() && self.record.is_empty() {
            return match self.trigger_play() {
                Err(ControllerError::NothingToPlay) => Ok(()),
                other => other,
            };
        }
        Ok(())
    }

    /// Plays a URL chosen by the local user.
    pub fn play_url(&mut self, media: MediaUrl) -> Result<()> {
        self.play_video(media, None, false)
    }

    /// Plays `media`, produced by source `source_index` (if any).
    pub fn play_video(
        &mut self,
        media: MediaUrl,
        source_index: Option<usize>,
        override_lock: bool,
    ) -> Result<()> {
        url::validate_url(&media.url)?;
        let increment = self.acquire(override_lock)?;
        self.load_new_video(media, source_index, increment)
    }

    fn load_new_video(
        &mut self,
        media: MediaUrl,
        source_index: Option<usize>,
        increment: u64,
    ) -> Result<()> {
        url::validate_url(&media.url)?;

        if let Some(previous) = self.current_source_mut() {
            previous.on_video_stop();
        }

        self.record.video_number += increment;
        if !self.record.hold_videos {
            self.record.playback_number = self.record.video_number;
        }
        self.record.set_media(&media, source_index);
        self.reset_timing();
        if source_index.is_some() {
            self.sources_dirty = true;
        }
        self.mark_dirty();

        info!(
            player = self.player(),
            video_number = self.record.video_number,
            source = ?source_index,
            url = %media.url,
            "Loading new video"
        );
        self.fallback_used = false;
        self.begin_load();
        Ok(())
    }

    /// Reloads the current media as a new video (loops, retries), without
    /// telling the source to stop.
    fn restart_current(&mut self) {
        if self.record.is_empty() {
            return;
        }
        self.record.video_number += 1;
        if !self.record.hold_videos {
            self.record.playback_number = self.record.video_number;
        }
        self.reset_timing();
        self.mark_dirty();
        debug!(video_number = self.record.video_number, "Restarting current video");
        self.begin_load();
    }

    fn reset_timing(&mut self) {
        self.record.start_network_time = 0.0;
        self.record.expected_end_time = 0.0;
        self.record.paused_position = 0.0;
        self.record.owner_playing = false;
        self.record.owner_paused = false;
    }

    /// Local preparation of a load for the current record.
    fn begin_load(&mut self) {
        let (mut kind, auto) =
            url::resolve_backend_kind(&self.record.url, self.record.backend_override);
        if auto && self.fallback_used {
            kind = BackendKind::Stream;
        }
        self.active_kind = kind;
        self.kind_auto = auto;
        self.target_offset = url::parse_start_offset(&self.record.url) as f64;
        self.loaded_video_number = self.record.video_number;
        self.state = PlayerState::Loading;
        self.video_ready = false;
        self.seekable = false;
        self.wait_for_sync = false;
        self.load_issued = None;
        self.stall.reset();
        self.emit(PlayerEvent::VideoStateUpdate);
        self.start_video_load(self.record.video_number);
    }

    /// Reloads the current record without touching it (decoder fallback,
    /// follower retry, authority resync).
    fn reload_local(&mut self) {
        self.state = PlayerState::Loading;
        self.video_ready = false;
        self.seekable = false;
        self.wait_for_sync = false;
        self.load_issued = None;
        self.stall.reset();
        self.emit(PlayerEvent::VideoStateUpdate);
        self.start_video_load(self.record.video_number);
    }

    fn start_video_load(&mut self, video_number: u64) {
        if video_number != self.record.video_number || self.record.is_empty() {
            debug!(video_number, current = self.record.video_number, "Stale load dropped");
            return;
        }
        if self.load_issued == Some(video_number) {
            return;
        }
        if !self.ctx.is_present() {
            debug!(video_number, "Outside the playback zone, load deferred");
            return;
        }

        let url = if self.settings.prefer_alternate_url && !self.record.alt_url.trim().is_empty() {
            self.record.alt_url.clone()
        } else {
            self.ctx.remap(&self.record.url)
        };

        self.load_issued = Some(video_number);
        self.pending_load_time = 0.0;
        if self.ctx.is_owner() {
            if let Some(source) = self.current_source_mut() {
                source.on_video_load();
            }
        }
        debug!(
            player = self.player(),
            video_number,
            kind = self.active_kind.as_str(),
            url = %url,
            "Backend load"
        );
        self.backend.load(&url, self.active_kind);
    }

    /// Host notification that the presence gate changed.
    pub fn on_presence_changed(&mut self) {
        if self.ctx.is_present() {
            if !self.record.is_empty() && self.load_issued != Some(self.record.video_number) {
                self.reload_local();
            }
        } else if self.load_issued.is_some() {
            info!(player = self.player(), "Left the playback zone");
            self.stop_local();
        }
    }

    fn current_source_mut(&mut self) -> Option<&mut Source> {
        let index = self.record.source_index?;
        self.sources.get_mut(index)
    }

    fn stop_local(&mut self) {
        self.backend.stop();
        self.state = PlayerState::Stopped;
        self.video_ready = false;
        self.wait_for_sync = false;
        self.load_issued = None;
        self.pending_load_time = 0.0;
        self.emit(PlayerEvent::VideoStateUpdate);
    }

    /// Authority: replicate "nothing playing".
    fn clear_record(&mut self) {
        if let Some(previous) = self.current_source_mut() {
            previous.on_video_stop();
        }
        self.record.video_number += 1;
        self.record.playback_number = self.record.video_number;
        self.record.set_media(&MediaUrl::default(), None);
        self.reset_timing();
        self.mark_dirty();
        self.loaded_video_number = self.record.video_number;
        info!(player = self.player(), video_number = self.record.video_number, "Playback cleared");
        self.stop_local();
    }

    // =====================================================================
    //  Backend events
    // =====================================================================

    pub fn on_backend_event(&mut self, event: BackendEvent) {
        if let BackendEvent::SourceChanged(kind) = event {
            self.active_kind = kind;
            self.emit(PlayerEvent::SourceChanged);
            return;
        }
        if self.load_issued != Some(self.record.video_number) {
            debug!(?event, "Backend event for a stale load ignored");
            return;
        }
        match event {
            BackendEvent::Ready { duration } => self.on_video_ready(duration),
            BackendEvent::Start => self.on_video_start(),
            BackendEvent::End => self.on_video_end(),
            BackendEvent::Error(code) => self.on_video_error(code),
            BackendEvent::SourceChanged(_) => {}
        }
    }

    fn on_video_ready(&mut self, duration: f64) {
        self.video_ready = true;
        self.track_duration = duration;
        self.seekable = duration.is_finite() && duration > 1.0;
        self.last_error = None;
        self.local_retries = 0;
        self.emit(PlayerEvent::VideoReady);

        if self.ctx.is_owner() {
            if let Some(source) = self.current_source_mut() {
                source.on_video_ready();
            }
            if self.record.is_held() {
                info!(video_number = self.record.video_number, "Video held until released");
                return;
            }
            self.start_playback();
        } else if self.record.owner_is_playing() {
            self.start_playback();
        } else {
            self.wait_for_sync = true;
        }
    }

    /// Calls `play` on the backend, seeking to where playback should be.
    fn start_playback(&mut self) {
        if self.record.is_held() {
            return;
        }
        if self.seekable {
            let target = if self.ctx.is_owner() {
                self.target_offset
            } else if self.record.owner_paused {
                self.record.paused_position
            } else {
                sync::target_offset(
                    self.ctx.now(),
                    self.record.start_network_time,
                    self.track_duration,
                )
            };
            if target > 0.0 {
                self.backend.set_time(target);
            }
        }
        self.wait_for_sync = false;
        self.backend.play();
    }

    fn on_video_start(&mut self) {
        self.state = PlayerState::Playing;
        self.emit(PlayerEvent::VideoStateUpdate);

        if self.ctx.is_owner() {
            if let Some(source) = self.current_source_mut() {
                source.on_video_start();
            }
            let now = self.ctx.now();
            self.record.start_network_time = now - self.target_offset;
            self.record.expected_end_time = if self.seekable {
                self.record.start_network_time + self.track_duration
            } else {
                0.0
            };
            self.record.owner_playing = true;
            self.record.owner_paused = false;
            self.mark_dirty();
            info!(
                player = self.player(),
                video_number = self.record.video_number,
                start = self.record.start_network_time,
                "Playback started"
            );
            self.sync_video();
        } else if self.record.owner_is_playing() {
            self.wait_for_sync = false;
            self.sync_video();
        } else {
            self.backend.pause();
            self.wait_for_sync = true;
        }
    }

    fn on_video_end(&mut self) {
        self.state = PlayerState::Stopped;
        self.emit(PlayerEvent::VideoStateUpdate);
        if !self.ctx.is_owner() {
            debug!(player = self.player(), "Video ended, waiting for the authority");
            return;
        }

        self.record.owner_playing = false;
        self.mark_dirty();
        let decision = self
            .current_source_mut()
            .map(|s| s.on_video_end())
            .unwrap_or_default();
        debug!(video_number = self.record.video_number, ?decision, "Video ended");

        match decision {
            SourceDecision::Retry => {
                let now = self.ctx.now();
                self.pending_load_time = now;
                self.scheduler.schedule(
                    now,
                    Delay::Frames(1),
                    Task::RestartCurrent {
                        video_number: self.record.video_number,
                    },
                );
            }
            SourceDecision::Stop => {
                info!(video_number = self.record.video_number, "Source asked to stop");
                self.backend.stop();
            }
            SourceDecision::Advance | SourceDecision::Default => self.conditional_play_next(false),
        }
    }

    fn on_video_error(&mut self, code: MediaErrorCode) {
        self.last_error = Some(code);
        self.video_ready = false;
        self.state = PlayerState::Error;
        self.emit(PlayerEvent::VideoStateUpdate);

        if self.kind_auto
            && self.active_kind == BackendKind::Progressive
            && code.is_decoder_related()
            && !self.fallback_used
        {
            info!(?code, video_number = self.record.video_number, "Retrying with the stream decoder");
            self.fallback_used = true;
            self.active_kind = BackendKind::Stream;
            self.reload_local();
            return;
        }

        let now = self.ctx.now();
        let video_number = self.record.video_number;
        let timeout = self.settings.retry_timeout;

        if !self.ctx.is_owner() {
            if self.settings.retry_on_error && self.local_retries < self.settings.local_retry_limit {
                self.local_retries += 1;
                debug!(?code, attempt = self.local_retries, "Local retry scheduled");
                self.pending_load_time = now + timeout;
                self.scheduler
                    .schedule(now, Delay::Seconds(timeout), Task::RetryLocal { video_number });
            } else {
                warn!(?code, video_number, "Local retries exhausted, waiting for the authority");
            }
            return;
        }

        self.record.owner_playing = false;
        self.mark_dirty();

        let mut decision = self
            .current_source_mut()
            .map(|s| s.on_video_error(code))
            .unwrap_or_default();
        if decision == SourceDecision::Default {
            decision = if self.settings.retry_on_error {
                SourceDecision::Retry
            } else {
                SourceDecision::Stop
            };
        }
        warn!(?code, video_number, ?decision, "Playback error");

        match decision {
            SourceDecision::Retry => {
                self.pending_load_time = now + timeout;
                self.scheduler
                    .schedule(now, Delay::Seconds(timeout), Task::RestartCurrent { video_number });
            }
            SourceDecision::Advance => {
                self.pending_load_time = now + timeout;
                self.scheduler
                    .schedule(now, Delay::Seconds(timeout), Task::PlayNext { video_number });
            }
            SourceDecision::Stop | SourceDecision::Default => self.backend.stop(),
        }
    }

    /// Advance algorithm (authority only).
    fn conditional_play_next(&mut self, skip: bool) {
        if !self.ctx.is_owner() {
            return;
        }
        let repeat = self.record.repeat_mode;
        if repeat == RepeatMode::Single && !skip && !self.record.is_empty() {
            self.restart_current();
            return;
        }

        match self
            .sources
            .take_next_url(self.record.source_index, repeat == RepeatMode::All)
        {
            Some((media, index)) => {
                self.sources_dirty = true;
                if let Err(e) = self.load_new_video(media, Some(index), 1) {
                    warn!(source = index, error = %e, "Source produced an unplayable URL");
                    self.clear_record();
                }
            }
            None if repeat.is_enabled() && !self.record.is_empty() => self.restart_current(),
            None => {
                info!(player = self.player(), "Nothing left to play");
                self.clear_record();
            }
        }
    }

    // =====================================================================
    //  Transport (authority)
    // =====================================================================

    /// Stops playback for everyone.
    pub fn stop(&mut self) -> Result<()> {
        self.acquire(false)?;
        self.clear_record();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.acquire(false)?;
        if self.record.is_empty() || self.record.owner_paused {
            return Ok(());
        }
        self.record.paused_position = self.backend.time();
        self.record.owner_paused = true;
        self.backend.pause();
        self.mark_dirty();
        self.emit(PlayerEvent::VideoStateUpdate);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.acquire(false)?;
        if !self.record.owner_paused {
            return Ok(());
        }
        let now = self.ctx.now();
        self.record.start_network_time = now - self.record.paused_position;
        if self.record.expected_end_time > 0.0 {
            self.record.expected_end_time = self.record.start_network_time + self.track_duration;
        }
        self.record.owner_paused = false;
        if self.video_ready && !self.record.is_held() {
            self.backend.play();
        }
        self.mark_dirty();
        self.emit(PlayerEvent::VideoStateUpdate);
        Ok(())
    }

    /// Seeks everyone to `seconds`. Ignored for unseekable media.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.acquire(false)?;
        if !self.seekable {
            debug!("Seek ignored: media is not seekable");
            return Ok(());
        }
        let target = seconds.clamp(0.0, self.track_duration);
        let now = self.ctx.now();
        self.record.start_network_time = now - target;
        self.record.expected_end_time = self.record.start_network_time + self.track_duration;
        if self.record.owner_paused {
            self.record.paused_position = target;
        }
        self.backend.set_time(target);
        self.stall.reset();
        self.mark_dirty();
        self.sync_video();
        Ok(())
    }

    /// Moves to the next URL of the chain now, ignoring repeat-single.
    pub fn skip(&mut self) -> Result<()> {
        self.acquire(false)?;
        self.conditional_play_next(true);
        Ok(())
    }

    /// Plays the previous playlist track.
    pub fn previous(&mut self) -> Result<()> {
        let increment = self.acquire(false)?;
        let wrap = self.record.repeat_mode == RepeatMode::All;
        let (media, index) = self
            .sources
            .take_previous_url(wrap)
            .ok_or(ControllerError::NothingToPlay)?;
        self.sources_dirty = true;
        self.load_new_video(media, Some(index), increment)
    }

    /// Lets a held video play.
    pub fn release_hold(&mut self) -> Result<()> {
        self.acquire(false)?;
        if !self.record.is_held() {
            return Ok(());
        }
        self.record.playback_number = self.record.video_number;
        self.mark_dirty();
        info!(video_number = self.record.video_number, "Hold released");
        if self.video_ready && self.state == PlayerState::Loading {
            self.start_playback();
        }
        Ok(())
    }

    // =====================================================================
    //  Session policy (authority)
    // =====================================================================

    pub fn set_locked(&mut self, locked: bool) -> Result<()> {
        if !self.ctx.is_authorized() {
            return Err(ControllerError::NotAuthorized("change the session lock"));
        }
        self.acquire(true)?;
        if self.record.locked != locked {
            self.record.locked = locked;
            self.mark_dirty();
            info!(player = self.player(), locked, "Session lock changed");
            self.emit(PlayerEvent::LockUpdate);
        }
        Ok(())
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) -> Result<()> {
        self.acquire(false)?;
        if self.record.repeat_mode != mode {
            self.record.repeat_mode = mode;
            self.mark_dirty();
            self.emit(PlayerEvent::InfoUpdate);
        }
        Ok(())
    }

    pub fn set_hold_videos(&mut self, hold: bool) -> Result<()> {
        self.acquire(false)?;
        if self.record.hold_videos != hold {
            self.record.hold_videos = hold;
            self.mark_dirty();
            self.emit(PlayerEvent::InfoUpdate);
        }
        if !hold {
            self.release_hold()?;
        }
        Ok(())
    }

    pub fn set_screen_fit(&mut self, fit: ScreenFit) -> Result<()> {
        self.acquire(false)?;
        if self.record.screen_fit != fit {
            self.record.screen_fit = fit;
            self.mark_dirty();
            self.emit(PlayerEvent::InfoUpdate);
        }
        Ok(())
    }

    /// Forces a decoder family (or back to auto) and reloads the current
    /// video with it.
    pub fn set_backend_override(&mut self, kind: Option<BackendKind>) -> Result<()> {
        self.acquire(false)?;
        if self.record.backend_override == kind {
            return Ok(());
        }
        self.record.backend_override = kind;
        self.mark_dirty();
        self.emit(PlayerEvent::InfoUpdate);
        self.fallback_used = false;
        self.restart_current();
        Ok(())
    }

    // =====================================================================
    //  Source chain
    // =====================================================================

    /// Queues a URL on behalf of the local player.
    pub fn enqueue(&mut self, queue: usize, media: MediaUrl) -> Result<()> {
        url::validate_url(&media.url)?;
        self.acquire(false)?;
        self.sources
            .enqueue(queue, media, self.ctx.local_player())?;
        self.sources_dirty = true;
        self.emit(PlayerEvent::PlaylistUpdate);
        Ok(())
    }

    /// Queues a playlist catalog track on behalf of the local player.
    pub fn enqueue_catalog(&mut self, queue: usize, playlist: usize, track: usize) -> Result<()> {
        self.acquire(false)?;
        self.sources
            .enqueue_catalog(queue, playlist, track, self.ctx.local_player())?;
        self.sources_dirty = true;
        self.emit(PlayerEvent::PlaylistUpdate);
        Ok(())
    }

    /// Runs `edit` on the source chain as the authority and replicates the
    /// result.
    pub fn edit_sources<R>(
        &mut self,
        edit: impl FnOnce(&mut SourceManager) -> pmotvsource::Result<R>,
    ) -> Result<R> {
        self.acquire(false)?;
        let result = edit(&mut self.sources)?;
        self.sources_dirty = true;
        self.emit(PlayerEvent::PlaylistUpdate);
        Ok(result)
    }

    // =====================================================================
    //  Replication
    // =====================================================================

    /// Applies an update received from the authority.
    pub fn apply_update(&mut self, update: ReplicatedUpdate) {
        if self.ctx.is_owner() {
            return;
        }
        match update {
            ReplicatedUpdate::Playback(record) => self.apply_record(record),
            ReplicatedUpdate::Sources(states) => {
                if self.sources.apply_snapshot(&states) {
                    self.emit(PlayerEvent::PlaylistUpdate);
                }
            }
        }
    }

    fn apply_record(&mut self, incoming: PlaybackRecord) {
        self.epoch_seen = self.epoch_seen.max(incoming.epoch);
        if !incoming.supersedes(&self.record) {
            debug!(
                epoch = incoming.epoch,
                incoming = incoming.revision.0,
                local_epoch = self.record.epoch,
                local = self.record.revision.0,
                "Outdated record ignored"
            );
            return;
        }
        self.record_received = true;
        let previous = mem::replace(&mut self.record, incoming);

        if previous.locked != self.record.locked {
            self.emit(PlayerEvent::LockUpdate);
        }
        if previous.repeat_mode != self.record.repeat_mode
            || previous.hold_videos != self.record.hold_videos
            || previous.screen_fit != self.record.screen_fit
            || previous.backend_override != self.record.backend_override
        {
            self.emit(PlayerEvent::InfoUpdate);
        }

        // Video numbers from two authorities can collide after a handover.
        let handed_over = previous.epoch != self.record.epoch && previous.url != self.record.url;
        if self.record.video_number != self.loaded_video_number || handed_over {
            if self.record.is_empty() {
                info!(player = self.player(), "Authority stopped playback");
                self.loaded_video_number = self.record.video_number;
                self.stop_local();
            } else {
                debug!(
                    player = self.player(),
                    video_number = self.record.video_number,
                    url = %self.record.url,
                    "Following new video"
                );
                self.fallback_used = false;
                self.local_retries = 0;
                self.begin_load();
            }
            return;
        }

        if self.record.is_empty() || !self.video_ready {
            return;
        }

        if self.record.owner_paused && !previous.owner_paused {
            self.backend.pause();
            if self.seekable {
                self.backend.set_time(self.record.paused_position);
            }
            self.emit(PlayerEvent::VideoStateUpdate);
        } else if self.record.owner_is_playing() {
            if self.wait_for_sync || !self.backend.is_playing() {
                self.start_playback();
            } else if previous.start_network_time != self.record.start_network_time {
                self.stall.reset();
                self.sync_video();
            }
        }
    }

    /// The authority answers a follower's resync request by publishing
    /// everything again.
    pub fn handle_resync_request(&mut self) {
        if self.ctx.is_owner() {
            debug!(player = self.player(), "Resync requested");
            self.record_dirty = true;
            self.sources_dirty = true;
        }
    }

    fn flush(&mut self) {
        if !self.ctx.is_owner() {
            self.record_dirty = false;
            self.sources_dirty = false;
            return;
        }
        if self.sources_dirty {
            self.sources_dirty = false;
            self.ctx
                .replicator
                .publish(ReplicatedUpdate::Sources(self.sources.snapshot()));
            self.emit(PlayerEvent::PlaylistUpdate);
        }
        if self.record_dirty {
            self.record_dirty = false;
            self.record.revision.bump();
            self.ctx
                .replicator
                .publish(ReplicatedUpdate::Playback(self.record.clone()));
        }
    }

    // =====================================================================
    //  Reconciliation
    // =====================================================================

    /// One reconciliation pass against the authority's clock.
    pub fn sync_video(&mut self) {
        let now = self.ctx.now();
        self.last_sync_time = now;
        if self.record.is_empty()
            || !self.video_ready
            || !self.seekable
            || self.state != PlayerState::Playing
        {
            return;
        }

        let duration = self.backend.duration();
        let current = self.backend.time();
        let target = if self.record.owner_paused {
            self.record.paused_position.clamp(0.0, duration.max(0.0))
        } else {
            sync::target_offset(now, self.record.start_network_time, duration)
        };
        self.track_target = target;

        match sync::plan_sync(
            current,
            target,
            duration,
            self.settings.sync_threshold,
            self.settings.sync_frequency,
            &mut self.stall,
        ) {
            SyncAction::Hold => {}
            SyncAction::Seek(position) => {
                debug!(player = self.player(), current, target = position, "Resync seek");
                self.backend.set_time(position);
            }
            SyncAction::ForceResync => {
                warn!(player = self.player(), current, target, "Playback stalled");
                self.force_resync();
            }
        }
    }

    fn force_resync(&mut self) {
        if self.ctx.is_owner() {
            let clock_target = sync::target_offset(
                self.ctx.now(),
                self.record.start_network_time,
                self.backend.duration(),
            );
            self.target_offset = self.backend.time().max(clock_target);
            info!(target = self.target_offset, "Authority reloading after stall");
            self.reload_local();
        } else {
            self.backend.stop();
            self.state = PlayerState::Stopped;
            self.video_ready = false;
            self.wait_for_sync = true;
            self.load_issued = None;
            self.loaded_video_number = 0;
            self.emit(PlayerEvent::VideoStateUpdate);
            self.ctx.replicator.request_resync();
        }
    }

    // =====================================================================
    //  Tick
    // =====================================================================

    pub fn tick(&mut self) {
        self.scheduler.advance_frame();

        for event in self.backend.drain_events() {
            self.on_backend_event(event);
        }
        self.check_ownership();

        let now = self.ctx.now();
        for task in self.scheduler.drain_due(now) {
            self.run_task(task);
        }

        let owner = self.ctx.is_owner();
        if !owner {
            if self.state == PlayerState::Playing
                && now - self.last_sync_time >= self.settings.sync_frequency
            {
                self.sync_video();
            }
            if self.wait_for_sync
                && self.video_ready
                && self.loaded_video_number == self.record.video_number
                && self.record.owner_is_playing()
            {
                self.start_playback();
            }
        }

        if self.state.is_active() && now - self.last_tracking_time >= self.settings.tracking_interval {
            self.last_tracking_time = now;
            self.track_position = self.backend.time();
            self.track_duration = self.backend.duration();
            self.emit(PlayerEvent::TrackingUpdate);
        }

        self.flush();
    }

    fn run_task(&mut self, task: Task) {
        let owner = self.ctx.is_owner();
        match task {
            Task::RestartCurrent { video_number } => {
                if owner && video_number == self.record.video_number {
                    self.restart_current();
                }
            }
            Task::PlayNext { video_number } => {
                if owner && video_number == self.record.video_number {
                    self.conditional_play_next(false);
                }
            }
            Task::RetryLocal { video_number } => {
                if !owner
                    && video_number == self.record.video_number
                    && self.state == PlayerState::Error
                {
                    self.reload_local();
                }
            }
            Task::OwnershipSync => {
                if owner || self.record_received {
                    return;
                }
                info!(player = self.player(), "No playback record yet, asking the authority");
                self.ctx.replicator.request_resync();
                self.scheduler.schedule(
                    self.ctx.now(),
                    Delay::Seconds(self.settings.ownership_sync_timeout),
                    Task::OwnershipSync,
                );
            }
        }
    }
}
