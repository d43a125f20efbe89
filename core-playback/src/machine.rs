//! # Playback State Machine
//!
//! Owns the authoritative playback and buffering state of one controller.
//!
//! ## Overview
//!
//! The machine is synchronous and side-effect free. Host commands and engine
//! reports go in; a [`Transition`] comes out, listing the [`Action`]s the
//! caller must perform against the media source and frame sink, and the
//! [`PlayerEvent`]s to publish. The [`VideoPlayer`](crate::player::VideoPlayer)
//! actor feeds it from a single task so no two inputs are ever applied
//! concurrently.
//!
//! ## Sessions
//!
//! Every load attempt runs under a fresh [`SessionId`]. Stopping, changing the
//! asset, retrying or failing moves to a newer session, and every input tagged
//! with an older one is discarded. This is what makes late callbacks from a
//! superseded engine load harmless.
//!
//! ## Recovery
//!
//! A failure while playing or paused re-issues the load silently (bounded by
//! [`RetryPolicy`]) and resumes at the last known position. Only exhausting
//! the retries is visible to the host, as [`PlaybackState::Failed`].

use crate::buffering::BufferingMonitor;
use crate::error::{PlaybackError, Result};
use crate::retry::{RetryDecision, RetryPolicy};
use bridge_traits::{
    AssetReference, BufferingState, FillMode, MediaEvent, MediaHandle, PlaybackState, SessionId,
};
use core_runtime::config::{PlaybackSettings, MAX_RETRY_DELAY};
use core_runtime::events::PlayerEvent;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Outputs
// ============================================================================

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Load the asset under a new session.
    Load {
        session: SessionId,
        asset: AssetReference,
    },
    /// Start playback; the result must be reported back through
    /// [`PlaybackStateMachine::on_play_started`] or
    /// [`PlaybackStateMachine::on_play_failed`].
    Play {
        session: SessionId,
        handle: MediaHandle,
    },
    Pause {
        handle: MediaHandle,
    },
    /// Halt and release the handle.
    Stop {
        handle: MediaHandle,
    },
    Seek {
        session: SessionId,
        handle: MediaHandle,
        position: Duration,
    },
    SetMuted {
        handle: MediaHandle,
        muted: bool,
    },
    /// Ask the source for the duration and report it through
    /// [`PlaybackStateMachine::on_duration`].
    QueryDuration {
        session: SessionId,
        handle: MediaHandle,
    },
    /// Call [`PlaybackStateMachine::on_retry_elapsed`] after `delay`.
    ScheduleRetry {
        session: SessionId,
        delay: Duration,
    },
    /// Drop any timer started by [`Action::ScheduleRetry`].
    CancelRetry,
    AttachSink {
        handle: MediaHandle,
    },
    DetachSink,
    SetFillMode {
        mode: FillMode,
    },
}

impl Action {
    /// Session an action is bound to. Bound actions are skipped once the
    /// machine has moved on to a newer session.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Action::Load { session, .. }
            | Action::Play { session, .. }
            | Action::Seek { session, .. }
            | Action::QueryDuration { session, .. }
            | Action::ScheduleRetry { session, .. } => Some(*session),
            _ => None,
        }
    }
}

/// Result of applying one input to the machine.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Side effects, in the order they must be performed.
    pub actions: Vec<Action>,
    /// Notifications, in the order they must be published.
    pub events: Vec<PlayerEvent>,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.events.is_empty()
    }

    fn act(&mut self, action: Action) {
        self.actions.push(action);
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.events.push(event);
    }
}

/// Read-only view of a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub playback: PlaybackState,
    pub buffering: BufferingState,
    /// `None` until the engine reports it.
    pub duration: Option<Duration>,
    /// Last known playback position.
    pub position: Duration,
    /// Consecutive failures since the last successful start.
    pub retry_count: u32,
    pub session: SessionId,
    pub has_asset: bool,
}

// ============================================================================
// Seeking
// ============================================================================

/// Clamp a host seek request (in seconds) into `[0, duration]`.
///
/// Negative and NaN requests go to zero. Without a known duration only the
/// lower bound applies.
pub fn clamp_seek(seconds: f64, duration: Option<Duration>) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }

    let target = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);
    match duration {
        Some(max) => target.min(max),
        None => target,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// State Machine
// ============================================================================

#[derive(Debug)]
pub struct PlaybackStateMachine {
    settings: PlaybackSettings,
    asset: Option<AssetReference>,
    playback: PlaybackState,
    buffering: BufferingMonitor,
    retry: RetryPolicy,
    session: SessionId,
    /// Handle of the completed load for the current session.
    handle: Option<MediaHandle>,
    /// A load (or scheduled retry) for the current session is outstanding.
    loading: bool,
    retry_pending: bool,
    sink_attached: bool,
    /// The host asked to play and no `Play` has been issued yet.
    wants_play: bool,
    /// `Play` was issued and the source has not acknowledged it yet.
    awaiting_ack: bool,
    /// Seek requested while no handle was available.
    pending_seek: Option<Duration>,
    position: Duration,
    duration: Option<Duration>,
}

impl PlaybackStateMachine {
    pub fn new(settings: PlaybackSettings, asset: Option<AssetReference>) -> Self {
        let retry = RetryPolicy::new(settings.max_retries);
        Self {
            settings,
            asset,
            playback: PlaybackState::Stopped,
            buffering: BufferingMonitor::new(),
            retry,
            session: SessionId::INITIAL,
            handle: None,
            loading: false,
            retry_pending: false,
            sink_attached: false,
            wants_play: false,
            awaiting_ack: false,
            pending_seek: None,
            position: Duration::ZERO,
            duration: None,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    pub fn buffering_state(&self) -> BufferingState {
        self.buffering.state()
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn retry_count(&self) -> u32 {
        self.retry.consecutive_failures()
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn asset(&self) -> Option<&AssetReference> {
        self.asset.as_ref()
    }

    pub fn handle(&self) -> Option<MediaHandle> {
        self.handle
    }

    /// Returns `true` while a load or scheduled retry is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// A play command has been accepted but playback has not visibly
    /// started yet.
    pub fn play_pending(&self) -> bool {
        self.wants_play || self.awaiting_ack
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            playback: self.playback,
            buffering: self.buffering.state(),
            duration: self.duration,
            position: self.position,
            retry_count: self.retry.consecutive_failures(),
            session: self.session,
            has_asset: self.asset.is_some(),
        }
    }

    // ------------------------------------------------------------------------
    // Host commands
    // ------------------------------------------------------------------------

    /// Reload the asset and play it from time zero.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoAsset`] when no asset is configured; the state is
    /// left untouched.
    pub fn play_from_beginning(&mut self) -> Result<Transition> {
        let asset = self.asset.clone().ok_or(PlaybackError::NoAsset)?;
        let mut out = Transition::default();

        out.emit(PlayerEvent::WillStartFromBeginning);
        self.release(&mut out);
        self.retry.reset();
        self.position = Duration::ZERO;
        self.pending_seek = None;
        self.begin_load(asset, &mut out);
        self.wants_play = true;

        info!(session = %self.session, "Playing from beginning");
        Ok(out)
    }

    /// Play from the last known position, reloading if nothing is loaded.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoAsset`] when no asset is configured.
    pub fn play_from_current_time(&mut self) -> Result<Transition> {
        let asset = self.asset.clone().ok_or(PlaybackError::NoAsset)?;
        let mut out = Transition::default();

        if self.playback == PlaybackState::Playing || self.wants_play || self.awaiting_ack {
            debug!(state = %self.playback, "Play already in effect");
            return Ok(out);
        }

        if self.handle.is_some() || self.loading {
            self.wants_play = true;
            self.try_start(&mut out);
        } else {
            self.release(&mut out);
            self.retry.reset();
            self.begin_load(asset, &mut out);
            self.wants_play = true;
        }

        info!(
            session = %self.session,
            position_ms = millis(self.position),
            "Playing from current time"
        );
        Ok(out)
    }

    /// Pause playback. Does nothing unless playing; a play still waiting on
    /// the engine goes ahead.
    pub fn pause(&mut self) -> Transition {
        let mut out = Transition::default();

        if self.playback != PlaybackState::Playing {
            debug!(state = %self.playback, "Ignoring pause");
            return out;
        }

        if let Some(handle) = self.handle {
            out.act(Action::Pause { handle });
        }
        self.wants_play = false;
        self.awaiting_ack = false;
        self.set_playback(PlaybackState::Paused, &mut out);

        out
    }

    /// Halt playback and release the engine. Valid from every state.
    pub fn stop(&mut self) -> Transition {
        let mut out = Transition::default();

        self.release(&mut out);
        self.session = self.session.next();
        self.pending_seek = None;
        self.reset_buffering(&mut out);
        self.set_playback(PlaybackState::Stopped, &mut out);

        out
    }

    /// Seek to `seconds`, clamped into the known duration.
    ///
    /// Ignored unless playing or paused. While a reload is in flight the seek
    /// is held and applied once the load completes.
    pub fn seek(&mut self, seconds: f64) -> Transition {
        let mut out = Transition::default();

        if !self.playback.is_active() {
            debug!(state = %self.playback, "Ignoring seek");
            return out;
        }

        let position = clamp_seek(seconds, self.duration);
        match self.handle {
            Some(handle) => {
                out.act(Action::Seek {
                    session: self.session,
                    handle,
                    position,
                });
                self.position = position;
                self.pending_seek = None;
            }
            None => {
                debug!(position_ms = millis(position), "Queueing seek until load completes");
                self.pending_seek = Some(position);
            }
        }

        out
    }

    /// Replace (or clear) the asset. Any current load is abandoned.
    pub fn set_asset(&mut self, asset: Option<AssetReference>) -> Transition {
        let mut out = Transition::default();

        self.release(&mut out);
        self.session = self.session.next();
        self.asset = asset;
        self.retry.reset();
        self.position = Duration::ZERO;
        self.pending_seek = None;
        self.duration = None;
        self.reset_buffering(&mut out);

        match (&self.asset, self.playback) {
            (Some(_), PlaybackState::Playing) => {
                self.set_playback(PlaybackState::Paused, &mut out)
            }
            (None, PlaybackState::Playing | PlaybackState::Paused) => {
                self.set_playback(PlaybackState::Stopped, &mut out)
            }
            _ => {}
        }

        out
    }

    /// Apply new settings. Never fails; out-of-range values are clamped.
    pub fn update_settings(&mut self, mut settings: PlaybackSettings) -> Transition {
        let mut out = Transition::default();

        if settings.retry_delay > MAX_RETRY_DELAY {
            warn!(
                requested_ms = millis(settings.retry_delay),
                "Clamping retry delay"
            );
            settings.retry_delay = MAX_RETRY_DELAY;
        }

        if settings.fill_mode != self.settings.fill_mode {
            out.act(Action::SetFillMode {
                mode: settings.fill_mode,
            });
        }

        if settings.muted != self.settings.muted {
            if let Some(handle) = self.handle {
                out.act(Action::SetMuted {
                    handle,
                    muted: settings.muted,
                });
            }
        }

        self.retry.set_max_retries(settings.max_retries);
        let preload_lifted =
            self.settings.preload_before_playing && !settings.preload_before_playing;
        self.settings = settings;

        if preload_lifted {
            self.try_start(&mut out);
        }

        out
    }

    // ------------------------------------------------------------------------
    // Engine reports
    // ------------------------------------------------------------------------

    pub fn on_loaded(&mut self, session: SessionId, handle: MediaHandle) -> Transition {
        let mut out = Transition::default();

        if !self.is_current(session) {
            debug!(%session, %handle, "Releasing superseded load");
            out.act(Action::Stop { handle });
            return out;
        }

        debug!(%session, %handle, "Load completed");
        self.handle = Some(handle);
        self.loading = false;

        out.act(Action::AttachSink { handle });
        self.sink_attached = true;
        out.act(Action::SetFillMode {
            mode: self.settings.fill_mode,
        });
        if self.settings.muted {
            out.act(Action::SetMuted {
                handle,
                muted: true,
            });
        }

        let resume = self.pending_seek.take().unwrap_or(self.position);
        self.position = resume;
        out.act(Action::Seek {
            session,
            handle,
            position: resume,
        });
        out.act(Action::QueryDuration { session, handle });

        if self.playback == PlaybackState::Playing {
            self.wants_play = true;
        }
        self.try_start(&mut out);

        out
    }

    pub fn on_load_failed(&mut self, session: SessionId, reason: String) -> Transition {
        let mut out = Transition::default();
        if !self.is_current(session) {
            return out;
        }

        self.loading = false;
        self.handle_failure(reason, &mut out);
        out
    }

    pub fn on_play_started(&mut self, session: SessionId) -> Transition {
        let mut out = Transition::default();
        if !self.is_current(session) {
            return out;
        }

        if self.awaiting_ack {
            self.awaiting_ack = false;
            // Acks during silent recovery are not a new start
            if self.playback != PlaybackState::Playing {
                self.retry.reset();
            }
            self.set_playback(PlaybackState::Playing, &mut out);
        }
        out
    }

    pub fn on_play_failed(&mut self, session: SessionId, reason: String) -> Transition {
        let mut out = Transition::default();
        if !self.is_current(session) {
            return out;
        }

        self.handle_failure(reason, &mut out);
        out
    }

    pub fn on_media_event(&mut self, session: SessionId, event: MediaEvent) -> Transition {
        let mut out = Transition::default();

        if !self.is_current(session) {
            debug!(%session, current = %self.session, ?event, "Discarding stale media event");
            return out;
        }

        let buffering_report = matches!(event, MediaEvent::Ready | MediaEvent::Stalled);
        if buffering_report && !self.playback.is_active() && !self.play_pending() {
            debug!(%session, state = %self.playback, ?event, "Ignoring buffering report while idle");
            return out;
        }

        match event {
            MediaEvent::Ready => {
                if let Some(state) = self.buffering.observe(&event) {
                    out.emit(PlayerEvent::BufferingChanged { state });
                }
                self.retry.reset();
                if let Some(handle) = self.handle {
                    out.act(Action::QueryDuration { session, handle });
                }
                self.try_start(&mut out);
            }
            MediaEvent::Stalled => {
                if let Some(state) = self.buffering.observe(&event) {
                    debug!(%session, "Playback stalled");
                    out.emit(PlayerEvent::BufferingChanged { state });
                }
            }
            MediaEvent::Progress { position } => {
                self.position = position;
                out.emit(PlayerEvent::PositionChanged {
                    position_ms: millis(position),
                });
            }
            MediaEvent::ReachedEnd => self.handle_end(&mut out),
            MediaEvent::Failed { reason } => self.handle_failure(reason, &mut out),
        }

        out
    }

    pub fn on_duration(&mut self, session: SessionId, duration: Option<Duration>) -> Transition {
        let mut out = Transition::default();
        if !self.is_current(session) {
            return out;
        }

        if let Some(duration) = duration {
            if self.duration != Some(duration) {
                self.duration = Some(duration);
                out.emit(PlayerEvent::DurationChanged {
                    duration_ms: millis(duration),
                });
            }
        }
        out
    }

    pub fn on_retry_elapsed(&mut self, session: SessionId) -> Transition {
        let mut out = Transition::default();
        if !self.is_current(session) || !self.retry_pending {
            return out;
        }

        self.retry_pending = false;
        if let Some(asset) = self.asset.clone() {
            out.act(Action::Load { session, asset });
        }
        out
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn is_current(&self, session: SessionId) -> bool {
        session == self.session
    }

    fn set_playback(&mut self, next: PlaybackState, out: &mut Transition) {
        if self.playback == next {
            return;
        }

        info!(from = %self.playback, to = %next, session = %self.session, "Playback state changed");
        self.playback = next;
        match next {
            PlaybackState::Playing => out.emit(PlayerEvent::PlaybackStarted),
            PlaybackState::Paused => out.emit(PlayerEvent::PlaybackPaused),
            PlaybackState::Stopped => out.emit(PlayerEvent::PlaybackStopped),
            // Failure notifications carry a reason and are emitted by `fail`
            PlaybackState::Failed => {}
        }
    }

    fn reset_buffering(&mut self, out: &mut Transition) {
        if let Some(state) = self.buffering.reset() {
            out.emit(PlayerEvent::BufferingChanged { state });
        }
    }

    /// Drop everything tied to the current load.
    fn release(&mut self, out: &mut Transition) {
        if self.retry_pending {
            self.retry_pending = false;
            out.act(Action::CancelRetry);
        }
        if let Some(handle) = self.handle.take() {
            out.act(Action::Stop { handle });
        }
        if self.sink_attached {
            self.sink_attached = false;
            out.act(Action::DetachSink);
        }
        self.loading = false;
        self.wants_play = false;
        self.awaiting_ack = false;
    }

    fn begin_load(&mut self, asset: AssetReference, out: &mut Transition) {
        self.session = self.session.next();
        self.loading = true;
        self.reset_buffering(out);
        debug!(session = %self.session, remote = asset.is_remote(), "Loading asset");
        out.act(Action::Load {
            session: self.session,
            asset,
        });
    }

    fn try_start(&mut self, out: &mut Transition) {
        if !self.wants_play {
            return;
        }
        let Some(handle) = self.handle else {
            return;
        };
        if self.settings.preload_before_playing && self.buffering.state() != BufferingState::Ready
        {
            debug!(session = %self.session, "Deferring play until ready");
            return;
        }

        self.wants_play = false;
        out.act(Action::Play {
            session: self.session,
            handle,
        });

        if self.settings.preload_before_playing {
            if self.playback != PlaybackState::Playing {
                self.retry.reset();
            }
            self.set_playback(PlaybackState::Playing, out);
        } else {
            self.awaiting_ack = true;
        }
    }

    fn handle_end(&mut self, out: &mut Transition) {
        info!(session = %self.session, loops = self.settings.loops, "Reached end of media");
        out.emit(PlayerEvent::ReachedEnd);

        if self.settings.loops {
            self.position = Duration::ZERO;
            self.wants_play = false;
            self.awaiting_ack = false;
            if let Some(handle) = self.handle {
                out.act(Action::Seek {
                    session: self.session,
                    handle,
                    position: Duration::ZERO,
                });
                out.act(Action::Play {
                    session: self.session,
                    handle,
                });
            }
            self.set_playback(PlaybackState::Playing, out);
        } else if self.settings.freeze_at_end {
            if let Some(handle) = self.handle {
                out.act(Action::Pause { handle });
            }
            self.wants_play = false;
            self.awaiting_ack = false;
            self.set_playback(PlaybackState::Paused, out);
        } else {
            self.release(out);
            self.session = self.session.next();
            self.pending_seek = None;
            self.position = Duration::ZERO;
            self.reset_buffering(out);
            self.set_playback(PlaybackState::Stopped, out);
        }
    }

    fn handle_failure(&mut self, reason: String, out: &mut Transition) {
        let decision = self.retry.record_failure();
        let RetryDecision::Retry { attempt } = decision else {
            self.fail(reason, out);
            return;
        };
        let Some(asset) = self.asset.clone() else {
            self.fail(reason, out);
            return;
        };

        warn!(
            session = %self.session,
            attempt,
            max_retries = self.retry.max_retries(),
            %reason,
            "Media failed, reloading"
        );

        // The sink stays attached so the last frame remains visible
        if let Some(handle) = self.handle.take() {
            out.act(Action::Stop { handle });
        }
        if self.awaiting_ack {
            self.awaiting_ack = false;
            self.wants_play = true;
        }

        self.session = self.session.next();
        self.loading = true;
        self.reset_buffering(out);
        out.emit(PlayerEvent::RetryScheduled {
            attempt,
            max_retries: self.retry.max_retries(),
        });

        let delay = self.settings.retry_delay;
        if delay.is_zero() {
            out.act(Action::Load {
                session: self.session,
                asset,
            });
        } else {
            self.retry_pending = true;
            out.act(Action::ScheduleRetry {
                session: self.session,
                delay,
            });
        }
    }

    fn fail(&mut self, reason: String, out: &mut Transition) {
        warn!(
            session = %self.session,
            failures = self.retry.consecutive_failures(),
            %reason,
            "Playback failed, giving up"
        );

        self.release(out);
        self.session = self.session.next();
        self.pending_seek = None;
        self.reset_buffering(out);
        self.playback = PlaybackState::Failed;
        out.emit(PlayerEvent::PlaybackFailed { reason });
    }
}
