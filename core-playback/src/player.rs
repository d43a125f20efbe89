//! # Video Player Controller
//!
//! Host-facing handle around a [`PlaybackStateMachine`].
//!
//! ## Overview
//!
//! [`VideoPlayer::new`] spawns a controller task that owns the state machine,
//! the media source and the frame sink. Host commands travel over a bounded
//! queue and are answered once their effects have been applied; adapter
//! callbacks travel over an internal queue that the task drains first. Every
//! input is therefore applied one at a time, in arrival order, and no lock is
//! ever held across a call into the media source.
//!
//! ```text
//! host ──commands──> ┌────────────────┐ ──actions──> MediaSource / FrameSink
//!                    │ controller task│
//! adapter ─events──> │ (state machine)│ ──events───> PlayerEventBus
//!                    └────────────────┘ ──snapshot─> watch channel
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{PlayerConfig, VideoPlayer};
//! use bridge_traits::AssetReference;
//! use std::sync::Arc;
//!
//! let config = PlayerConfig::builder()
//!     .media_source(Arc::new(MyMediaSource::new()))
//!     .asset(AssetReference::url("https://cdn.example.com/intro.m3u8"))
//!     .build()?;
//!
//! let player = VideoPlayer::new(config)?;
//! let mut events = player.subscribe();
//! player.play_from_beginning().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.description());
//! }
//! ```
//!
//! Dropping the last handle stops playback and ends the task.

use crate::error::{PlaybackError, Result};
use crate::machine::{Action, PlaybackStateMachine, PlayerSnapshot, Transition};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AssetReference, BufferingState, FillMode, FrameSink, MediaEvent, MediaEventListener,
    MediaHandle, MediaSource, PlaybackState, SessionId,
};
use core_runtime::config::{PlaybackSettings, PlayerConfig};
use core_runtime::events::{EventSeverity, EventStream, PlayerEvent, PlayerEventBus};
use core_runtime::logging::redact_locator;
use std::collections::VecDeque;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

type Reply = oneshot::Sender<Result<()>>;
type SettingsUpdate = Box<dyn FnOnce(&mut PlaybackSettings) + Send>;

enum Command {
    PlayFromBeginning(Reply),
    PlayFromCurrentTime(Reply),
    Pause(Reply),
    Stop(Reply),
    Seek {
        seconds: f64,
        reply: Reply,
    },
    SetAsset {
        asset: Option<AssetReference>,
        reply: Reply,
    },
    UpdateSettings {
        update: SettingsUpdate,
        reply: Reply,
    },
    Shutdown(Reply),
}

/// Reports produced outside the controller task.
enum Internal {
    Media {
        session: SessionId,
        handle: MediaHandle,
        event: MediaEvent,
    },
    Loaded {
        session: SessionId,
        result: BridgeResult<MediaHandle>,
    },
    RetryElapsed {
        session: SessionId,
    },
}

/// Listener handed to the media source for one load. Tags every callback
/// with the session it was created for.
struct SessionListener {
    session: SessionId,
    tx: mpsc::UnboundedSender<Internal>,
}

impl MediaEventListener for SessionListener {
    fn on_event(&self, handle: MediaHandle, event: MediaEvent) {
        let message = Internal::Media {
            session: self.session,
            handle,
            event,
        };
        if self.tx.send(message).is_err() {
            trace!(session = %self.session, "Controller closed, dropping media event");
        }
    }
}

// ============================================================================
// Controller Task
// ============================================================================

struct PlayerActor {
    machine: PlaybackStateMachine,
    source: Arc<dyn MediaSource>,
    sink: Option<Arc<dyn FrameSink>>,
    events: PlayerEventBus,
    snapshot: watch::Sender<PlayerSnapshot>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    retry_timer: Option<CancellationToken>,
}

impl PlayerActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!("Player controller started");

        loop {
            tokio::select! {
                biased;

                Some(message) = internal.recv() => self.handle_internal(message).await,
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!("All player handles dropped");
                        self.shut_down().await;
                        break;
                    }
                },
            }
        }

        info!("Player controller stopped");
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::PlayFromBeginning(reply) => {
                let result = self.machine.play_from_beginning();
                self.complete(result, reply).await;
            }
            Command::PlayFromCurrentTime(reply) => {
                let result = self.machine.play_from_current_time();
                self.complete(result, reply).await;
            }
            Command::Pause(reply) => {
                let transition = self.machine.pause();
                self.complete(Ok(transition), reply).await;
            }
            Command::Stop(reply) => {
                let transition = self.machine.stop();
                self.complete(Ok(transition), reply).await;
            }
            Command::Seek { seconds, reply } => {
                let transition = self.machine.seek(seconds);
                self.complete(Ok(transition), reply).await;
            }
            Command::SetAsset { asset, reply } => {
                match &asset {
                    Some(asset) => {
                        info!(asset = %redact_locator(&asset.to_string()), "Asset changed")
                    }
                    None => info!("Asset cleared"),
                }
                let transition = self.machine.set_asset(asset);
                self.complete(Ok(transition), reply).await;
            }
            Command::UpdateSettings { update, reply } => {
                let mut settings = self.machine.settings().clone();
                update(&mut settings);
                let transition = self.machine.update_settings(settings);
                self.complete(Ok(transition), reply).await;
            }
            Command::Shutdown(reply) => {
                self.shut_down().await;
                let _ = reply.send(Ok(()));
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn complete(&mut self, result: Result<Transition>, reply: Reply) {
        let outcome = match result {
            Ok(transition) => {
                self.apply(transition).await;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "Command rejected");
                Err(error)
            }
        };
        let _ = reply.send(outcome);
    }

    async fn handle_internal(&mut self, message: Internal) {
        let transition = match message {
            Internal::Media {
                session,
                handle,
                event,
            } => {
                trace!(%session, %handle, ?event, "Media event");
                self.machine.on_media_event(session, event)
            }
            Internal::Loaded {
                session,
                result: Ok(handle),
            } => self.machine.on_loaded(session, handle),
            Internal::Loaded {
                session,
                result: Err(error),
            } => {
                warn!(%session, %error, "Load failed");
                self.machine.on_load_failed(session, error.to_string())
            }
            Internal::RetryElapsed { session } => {
                if session == self.machine.session() {
                    self.retry_timer = None;
                }
                self.machine.on_retry_elapsed(session)
            }
        };
        self.apply(transition).await;
    }

    /// Perform a transition and everything it triggers, then publish the
    /// resulting snapshot.
    async fn apply(&mut self, transition: Transition) {
        let mut pending = VecDeque::from([transition]);

        while let Some(transition) = pending.pop_front() {
            for event in transition.events {
                self.publish(event);
            }

            for action in transition.actions {
                if let Some(session) = action.session() {
                    if session != self.machine.session() {
                        debug!(%session, ?action, "Skipping superseded action");
                        continue;
                    }
                }

                if let Some(follow_up) = self.perform(action).await {
                    pending.push_back(follow_up);
                }
            }
        }

        self.snapshot.send_replace(self.machine.snapshot());
    }

    async fn perform(&mut self, action: Action) -> Option<Transition> {
        match action {
            Action::Load { session, asset } => {
                self.spawn_load(session, asset);
                None
            }
            Action::Play { session, handle } => match self.source.play(handle).await {
                Ok(()) => Some(self.machine.on_play_started(session)),
                Err(error) => {
                    warn!(%session, %handle, %error, "Play failed");
                    Some(self.machine.on_play_failed(session, error.to_string()))
                }
            },
            Action::Pause { handle } => {
                if let Err(error) = self.source.pause(handle).await {
                    warn!(%handle, %error, "Pause failed");
                }
                None
            }
            Action::Stop { handle } => {
                if let Err(error) = self.source.stop(handle).await {
                    warn!(%handle, %error, "Stop failed");
                }
                None
            }
            Action::Seek {
                handle, position, ..
            } => {
                if let Err(error) = self.source.seek(handle, position).await {
                    warn!(%handle, position_ms = position.as_millis() as u64, %error, "Seek failed");
                }
                None
            }
            Action::SetMuted { handle, muted } => {
                if let Err(error) = self.source.set_muted(handle, muted).await {
                    warn!(%handle, muted, %error, "Mute change failed");
                }
                None
            }
            Action::QueryDuration { session, handle } => {
                let duration = self.source.current_duration(handle).await;
                Some(self.machine.on_duration(session, duration))
            }
            Action::ScheduleRetry { session, delay } => {
                self.schedule_retry(session, delay);
                None
            }
            Action::CancelRetry => {
                if let Some(timer) = self.retry_timer.take() {
                    timer.cancel();
                }
                None
            }
            Action::AttachSink { handle } => {
                if let Some(sink) = &self.sink {
                    sink.attach(handle);
                }
                None
            }
            Action::DetachSink => {
                if let Some(sink) = &self.sink {
                    sink.detach();
                }
                None
            }
            Action::SetFillMode { mode } => {
                if let Some(sink) = &self.sink {
                    sink.set_fill_mode(mode);
                }
                None
            }
        }
    }

    fn spawn_load(&self, session: SessionId, asset: AssetReference) {
        let source = Arc::clone(&self.source);
        let tx = self.internal_tx.clone();
        let listener: Arc<dyn MediaEventListener> = Arc::new(SessionListener {
            session,
            tx: tx.clone(),
        });

        debug!(%session, asset = %redact_locator(&asset.to_string()), "Starting load");
        tokio::spawn(async move {
            let result = source.load(&asset, listener).await;
            if let Err(mpsc::error::SendError(Internal::Loaded {
                result: Ok(handle), ..
            })) = tx.send(Internal::Loaded { session, result })
            {
                // Nobody is left to own the handle
                let _ = source.stop(handle).await;
            }
        });
    }

    fn schedule_retry(&mut self, session: SessionId, delay: Duration) {
        let token = CancellationToken::new();
        if let Some(previous) = self.retry_timer.replace(token.clone()) {
            previous.cancel();
        }

        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Internal::RetryElapsed { session });
                }
            }
        });
    }

    fn publish(&self, event: PlayerEvent) {
        match event.severity() {
            EventSeverity::Error => error!(?event, "{}", event.description()),
            EventSeverity::Warning => warn!(?event, "{}", event.description()),
            EventSeverity::Info => info!(?event, "{}", event.description()),
            EventSeverity::Debug => trace!(?event, "{}", event.description()),
        }
        // No subscribers is fine
        self.events.emit(event).ok();
    }

    async fn shut_down(&mut self) {
        let transition = self.machine.stop();
        self.apply(transition).await;
        if let Some(timer) = self.retry_timer.take() {
            timer.cancel();
        }
    }
}

// ============================================================================
// Host Handle
// ============================================================================

/// Playback controller for a single video asset.
pub struct VideoPlayer {
    commands: mpsc::Sender<Command>,
    events: PlayerEventBus,
    snapshot: watch::Receiver<PlayerSnapshot>,
}

impl VideoPlayer {
    /// Create a controller and spawn its task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Runtime`] when the configuration is invalid or no
    ///   tokio runtime is running
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            core_runtime::Error::CapabilityMissing {
                capability: "TokioRuntime".to_string(),
                message: "VideoPlayer::new must be called from within a tokio runtime"
                    .to_string(),
            }
        })?;

        let PlayerConfig {
            media_source,
            frame_sink,
            settings,
            asset,
            event_buffer_size,
            command_buffer_size,
        } = config;

        let machine = PlaybackStateMachine::new(settings, asset);
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let (command_tx, command_rx) = mpsc::channel(command_buffer_size);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let events = PlayerEventBus::new(event_buffer_size);

        let actor = PlayerActor {
            machine,
            source: media_source,
            sink: frame_sink,
            events: events.clone(),
            snapshot: snapshot_tx,
            internal_tx,
            retry_timer: None,
        };
        runtime.spawn(actor.run(command_rx, internal_rx));

        Ok(Self {
            commands: command_tx,
            events,
            snapshot: snapshot_rx,
        })
    }

    async fn request(&self, build: impl FnOnce(Reply) -> Command) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| PlaybackError::ControllerClosed)?;
        reply_rx.await.map_err(|_| PlaybackError::ControllerClosed)?
    }

    // ------------------------------------------------------------------------
    // Playback commands
    // ------------------------------------------------------------------------

    /// Reload the asset and play it from time zero.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoAsset`] when no asset is configured.
    #[instrument(skip(self))]
    pub async fn play_from_beginning(&self) -> Result<()> {
        self.request(Command::PlayFromBeginning).await
    }

    /// Play from the last known position. No-op while already playing.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoAsset`] when no asset is configured.
    #[instrument(skip(self))]
    pub async fn play_from_current_time(&self) -> Result<()> {
        self.request(Command::PlayFromCurrentTime).await
    }

    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    /// Halt playback and release the loaded media. Valid in every state.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Seek to `seconds`. Values outside `[0, duration]` are clamped; the
    /// request is ignored unless playing or paused.
    #[instrument(skip(self))]
    pub async fn seek(&self, seconds: f64) -> Result<()> {
        self.request(|reply| Command::Seek { seconds, reply }).await
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Replace the asset. A playing controller is paused and the previous
    /// load is released.
    pub async fn set_asset(&self, asset: AssetReference) -> Result<()> {
        self.request(|reply| Command::SetAsset {
            asset: Some(asset),
            reply,
        })
        .await
    }

    pub async fn clear_asset(&self) -> Result<()> {
        self.request(|reply| Command::SetAsset { asset: None, reply })
            .await
    }

    /// Edit the playback settings in place.
    ///
    /// ```ignore
    /// player.update_settings(|s| {
    ///     s.loops = true;
    ///     s.max_retries = 5;
    /// }).await?;
    /// ```
    pub async fn update_settings<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut PlaybackSettings) + Send + 'static,
    {
        self.request(|reply| Command::UpdateSettings {
            update: Box::new(update),
            reply,
        })
        .await
    }

    pub async fn set_loops(&self, loops: bool) -> Result<()> {
        self.update_settings(move |settings| settings.loops = loops)
            .await
    }

    pub async fn set_freeze_at_end(&self, freeze: bool) -> Result<()> {
        self.update_settings(move |settings| settings.freeze_at_end = freeze)
            .await
    }

    pub async fn set_preload_before_playing(&self, preload: bool) -> Result<()> {
        self.update_settings(move |settings| settings.preload_before_playing = preload)
            .await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.update_settings(move |settings| settings.muted = muted)
            .await
    }

    pub async fn set_fill_mode(&self, mode: FillMode) -> Result<()> {
        self.update_settings(move |settings| settings.fill_mode = mode)
            .await
    }

    /// Takes effect on the next failure; the current count is kept.
    pub async fn set_max_retries(&self, max_retries: u32) -> Result<()> {
        self.update_settings(move |settings| settings.max_retries = max_retries)
            .await
    }

    /// Values above one minute are clamped.
    pub async fn set_retry_delay(&self, delay: Duration) -> Result<()> {
        self.update_settings(move |settings| settings.retry_delay = delay)
            .await
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Subscribe to this controller's notifications.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Watch the read-only properties as a whole.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.snapshot.borrow().playback
    }

    pub fn buffering_state(&self) -> BufferingState {
        self.snapshot.borrow().buffering
    }

    /// Duration of the loaded asset, once the engine has reported it.
    pub fn max_duration(&self) -> Option<Duration> {
        self.snapshot.borrow().duration
    }

    pub fn position(&self) -> Duration {
        self.snapshot.borrow().position
    }

    pub fn retry_count(&self) -> u32 {
        self.snapshot.borrow().retry_count
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Stop playback and end the controller task. Later commands fail with
    /// [`PlaybackError::ControllerClosed`].
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        match self.request(Command::Shutdown).await {
            Err(PlaybackError::ControllerClosed) => Ok(()),
            other => other,
        }
    }
}

impl fmt::Debug for VideoPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoPlayer")
            .field("snapshot", &*self.snapshot.borrow())
            .field("subscribers", &self.events.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
