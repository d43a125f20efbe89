//! # Player Event Bus
//!
//! Delivers playback notifications from one controller to its host observers
//! using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Every controller owns its own [`PlayerEventBus`]; there is no process-wide
//! notification center. Observers subscribe to the bus of the controller they
//! care about and receive typed [`PlayerEvent`]s in the order the controller
//! applied them.
//!
//! ```text
//! ┌──────────────┐   emit    ┌────────────────┐  subscribe  ┌────────────┐
//! │ VideoPlayer  ├──────────>│ PlayerEventBus ├────────────>│ Observer A │
//! │   (actor)    │           │  (broadcast)   ├────────────>│ Observer B │
//! └──────────────┘           └────────────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventStream, PlayerEvent, PlayerEventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = PlayerEventBus::new(16);
//! let mut stream = EventStream::new(bus.subscribe()).filter(PlayerEvent::is_playback_transition);
//!
//! bus.emit(PlayerEvent::PositionChanged { position_ms: 1_000 }).ok();
//! bus.emit(PlayerEvent::PlaybackStarted).ok();
//!
//! assert_eq!(stream.recv().await.unwrap(), PlayerEvent::PlaybackStarted);
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the observer was too slow and missed `n`
//!   events. Non-fatal; read the controller's snapshot to resynchronize.
//! - **`RecvError::Closed`**: the controller shut down.

use bridge_traits::playback::BufferingState;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for a controller's event channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Player Events
// ============================================================================

/// Notification emitted by a playback controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// Playback started (or resumed).
    PlaybackStarted,
    /// Playback paused, either by the host or by freezing at the end.
    PlaybackPaused,
    /// Playback stopped and engine resources were released.
    PlaybackStopped,
    /// Automatic recovery gave up.
    PlaybackFailed { reason: String },
    /// Engine data availability changed.
    BufferingChanged { state: BufferingState },
    /// A play-from-beginning command was accepted.
    WillStartFromBeginning,
    /// The engine reached the end of the asset.
    ReachedEnd,
    /// The asset's duration became known.
    DurationChanged { duration_ms: u64 },
    /// The engine reported a new playback position.
    PositionChanged { position_ms: u64 },
    /// A failed load is being retried.
    RetryScheduled { attempt: u32, max_retries: u32 },
}

impl PlayerEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            PlayerEvent::PlaybackStarted => "Playback started",
            PlayerEvent::PlaybackPaused => "Playback paused",
            PlayerEvent::PlaybackStopped => "Playback stopped",
            PlayerEvent::PlaybackFailed { .. } => "Playback failed",
            PlayerEvent::BufferingChanged { .. } => "Buffering state changed",
            PlayerEvent::WillStartFromBeginning => "Playback will start from beginning",
            PlayerEvent::ReachedEnd => "Reached end of media",
            PlayerEvent::DurationChanged { .. } => "Duration changed",
            PlayerEvent::PositionChanged { .. } => "Playback position changed",
            PlayerEvent::RetryScheduled { .. } => "Retrying failed load",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PlayerEvent::PlaybackFailed { .. } => EventSeverity::Error,
            PlayerEvent::RetryScheduled { .. } => EventSeverity::Warning,
            PlayerEvent::PlaybackStarted
            | PlayerEvent::PlaybackPaused
            | PlayerEvent::PlaybackStopped => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Returns `true` for the primary started/paused/stopped/failed signals.
    pub fn is_playback_transition(&self) -> bool {
        matches!(
            self,
            PlayerEvent::PlaybackStarted
                | PlayerEvent::PlaybackPaused
                | PlayerEvent::PlaybackStopped
                | PlayerEvent::PlaybackFailed { .. }
        )
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Bus and subscriptions
// ============================================================================

/// Broadcast channel owned by a single controller.
#[derive(Clone)]
pub struct PlayerEventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl PlayerEventBus {
    /// `capacity` bounds how far an observer may fall behind before it sees
    /// [`RecvError::Lagged`]. Must be non-zero; `PlayerConfig` validation
    /// guarantees that for controller-owned buses.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::Sender::new(capacity),
        }
    }

    /// Returns how many observers received the event. Having none is an
    /// error the controller ignores.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PlayerEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for PlayerEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerEventBus({} subscribers)", self.subscriber_count())
    }
}

type Predicate = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// A subscription that skips events its predicate rejects.
///
/// Lag and closure are reported whether or not a predicate is set.
pub struct EventStream {
    receiver: Receiver<PlayerEvent>,
    predicate: Option<Predicate>,
}

impl EventStream {
    pub fn new(receiver: Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            predicate: None,
        }
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Box::new(predicate)),
            ..self
        }
    }

    fn wants(&self, event: &PlayerEvent) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate(event))
    }

    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// `None` when no wanted event is queued right now.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.wants(&event) {
                return Some(Ok(event));
            }
        }
    }

    /// Adapts the subscription into a `Stream` that ends when the controller
    /// shuts down. Lag is still yielded as an error item.
    pub fn into_stream(self) -> impl Stream<Item = Result<PlayerEvent, RecvError>> + Send {
        stream::unfold(self, |mut events| async move {
            match events.recv().await {
                Err(RecvError::Closed) => None,
                item => Some((item, events)),
            }
        })
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.predicate.is_some())
            .field("queued", &self.receiver.len())
            .finish()
    }
}
