//! Integration tests for the `VideoPlayer` controller
//!
//! The media engine is replaced by a scripted source that records every call
//! and keeps the listener of every load, so tests can inject engine events
//! for current and superseded sessions alike.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use core_playback::{
    AssetReference, BufferingState, EventStream, FillMode, FrameSink, MediaEvent,
    MediaEventListener, MediaHandle, MediaSource, PlaybackError, PlaybackSettings,
    PlaybackState, PlayerConfig, PlayerEvent, PlayerSnapshot, VideoPlayer,
};
use mockall::mock;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Scripted Media Source
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(AssetReference),
    Play(MediaHandle),
    Pause(MediaHandle),
    Stop(MediaHandle),
    Seek(MediaHandle, Duration),
    SetMuted(MediaHandle, bool),
}

#[derive(Default)]
struct ScriptedSource {
    calls: Mutex<Vec<Call>>,
    listeners: Mutex<Vec<(MediaHandle, Arc<dyn MediaEventListener>)>>,
    next_handle: AtomicU64,
    failing_loads: AtomicU32,
    duration: Option<Duration>,
}

impl ScriptedSource {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_duration(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration: Some(duration),
            ..Self::default()
        })
    }

    fn fail_next_loads(&self, count: u32) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn has_call(&self, call: &Call) -> bool {
        self.calls.lock().contains(call)
    }

    fn loads(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Load(_)))
            .count()
    }

    fn plays(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Play(_)))
            .count()
    }

    /// Listener and handle of the `index`-th successful load.
    fn listener(&self, index: usize) -> (MediaHandle, Arc<dyn MediaEventListener>) {
        let listeners = self.listeners.lock();
        let (handle, listener) = &listeners[index];
        (*handle, Arc::clone(listener))
    }

    /// Report an event for the most recent successful load.
    fn emit(&self, event: MediaEvent) {
        let latest = self.listeners.lock().last().cloned();
        let (handle, listener) = latest.expect("no load has completed");
        listener.on_event(handle, event);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    async fn load(
        &self,
        asset: &AssetReference,
        listener: Arc<dyn MediaEventListener>,
    ) -> BridgeResult<MediaHandle> {
        self.record(Call::Load(asset.clone()));

        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(BridgeError::LoadFailed("connection reset".to_string()));
        }

        let handle = MediaHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.listeners.lock().push((handle, listener));
        Ok(handle)
    }

    async fn play(&self, handle: MediaHandle) -> BridgeResult<()> {
        self.record(Call::Play(handle));
        Ok(())
    }

    async fn pause(&self, handle: MediaHandle) -> BridgeResult<()> {
        self.record(Call::Pause(handle));
        Ok(())
    }

    async fn stop(&self, handle: MediaHandle) -> BridgeResult<()> {
        self.record(Call::Stop(handle));
        Ok(())
    }

    async fn seek(&self, handle: MediaHandle, position: Duration) -> BridgeResult<()> {
        self.record(Call::Seek(handle, position));
        Ok(())
    }

    async fn current_duration(&self, _handle: MediaHandle) -> Option<Duration> {
        self.duration
    }

    async fn set_muted(&self, handle: MediaHandle, muted: bool) -> BridgeResult<()> {
        self.record(Call::SetMuted(handle, muted));
        Ok(())
    }
}

mock! {
    Sink {}

    impl FrameSink for Sink {
        fn attach(&self, handle: MediaHandle);
        fn detach(&self);
        fn set_fill_mode(&self, mode: FillMode);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn asset() -> AssetReference {
    AssetReference::url("https://cdn.example.com/trailer.m3u8?token=secret")
}

fn player_with(source: &Arc<ScriptedSource>, settings: PlaybackSettings) -> VideoPlayer {
    let config = PlayerConfig::builder()
        .media_source(source.clone())
        .settings(settings)
        .asset(asset())
        .build()
        .unwrap();
    VideoPlayer::new(config).unwrap()
}

async fn wait_until<F>(player: &VideoPlayer, mut predicate: F) -> PlayerSnapshot
where
    F: FnMut(&PlayerSnapshot) -> bool,
{
    let mut snapshots = player.subscribe_snapshot();
    let snapshot = timeout(WAIT, snapshots.wait_for(|snapshot| predicate(snapshot)))
        .await
        .expect("timed out waiting for player state")
        .expect("player closed");
    snapshot.clone()
}

async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn start(player: &VideoPlayer) {
    player.play_from_beginning().await.unwrap();
    wait_until(player, |s| s.playback == PlaybackState::Playing).await;
}

fn drain(stream: &mut EventStream) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Some(Ok(event)) = stream.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_play_from_beginning_starts_playback() {
    let source = ScriptedSource::with_duration(Duration::from_secs(60));
    let player = player_with(&source, PlaybackSettings::default());
    let mut events = player.subscribe();

    start(&player).await;
    let snapshot = wait_until(&player, |s| s.duration.is_some()).await;
    assert_eq!(snapshot.duration, Some(Duration::from_secs(60)));
    assert_eq!(player.max_duration(), Some(Duration::from_secs(60)));

    let handle = MediaHandle::new(1);
    assert_eq!(
        source.calls(),
        vec![
            Call::Load(asset()),
            Call::Seek(handle, Duration::ZERO),
            Call::Play(handle),
        ]
    );

    let events = drain(&mut events);
    assert_eq!(events.first(), Some(&PlayerEvent::WillStartFromBeginning));
    assert!(events.contains(&PlayerEvent::PlaybackStarted));
    assert!(events.contains(&PlayerEvent::DurationChanged {
        duration_ms: 60_000
    }));
}

#[tokio::test]
async fn test_play_without_asset_is_rejected() {
    let source = ScriptedSource::new();
    let config = PlayerConfig::builder()
        .media_source(source.clone())
        .build()
        .unwrap();
    let player = VideoPlayer::new(config).unwrap();

    assert_eq!(
        player.play_from_beginning().await,
        Err(PlaybackError::NoAsset)
    );
    assert_eq!(
        player.play_from_current_time().await,
        Err(PlaybackError::NoAsset)
    );
    assert_eq!(player.playback_state(), PlaybackState::Stopped);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    let handle = MediaHandle::new(1);

    // Pause while stopped is a no-op
    player.pause().await.unwrap();
    assert_eq!(player.playback_state(), PlaybackState::Stopped);

    start(&player).await;
    player.pause().await.unwrap();
    assert_eq!(player.playback_state(), PlaybackState::Paused);
    assert!(source.has_call(&Call::Pause(handle)));

    player.play_from_current_time().await.unwrap();
    wait_until(&player, |s| s.playback == PlaybackState::Playing).await;
    assert_eq!(source.plays(), 2);
    // Resumed on the existing load
    assert_eq!(source.loads(), 1);
}

#[tokio::test]
async fn test_stop_releases_engine() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    let mut events = player.subscribe();

    start(&player).await;
    source.emit(MediaEvent::Ready);
    wait_until(&player, |s| s.buffering == BufferingState::Ready).await;

    player.stop().await.unwrap();
    assert_eq!(player.playback_state(), PlaybackState::Stopped);
    assert_eq!(player.buffering_state(), BufferingState::Unknown);
    assert!(source.has_call(&Call::Stop(MediaHandle::new(1))));

    let events = drain(&mut events);
    assert!(events.contains(&PlayerEvent::PlaybackStopped));
    assert_eq!(
        events.last(),
        Some(&PlayerEvent::PlaybackStopped),
        "stop notification comes after the buffering reset"
    );
}

#[tokio::test]
async fn test_stalls_do_not_change_playback_state() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;

    source.emit(MediaEvent::Stalled);
    let snapshot = wait_until(&player, |s| s.buffering == BufferingState::Delayed).await;
    assert_eq!(snapshot.playback, PlaybackState::Playing);

    source.emit(MediaEvent::Ready);
    let snapshot = wait_until(&player, |s| s.buffering == BufferingState::Ready).await;
    assert_eq!(snapshot.playback, PlaybackState::Playing);
}

#[tokio::test]
async fn test_seek_is_clamped() {
    let source = ScriptedSource::with_duration(Duration::from_secs(60));
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;
    wait_until(&player, |s| s.duration.is_some()).await;
    let handle = MediaHandle::new(1);

    player.seek(90.0).await.unwrap();
    assert_eq!(
        source.calls().last(),
        Some(&Call::Seek(handle, Duration::from_secs(60)))
    );
    assert_eq!(player.position(), Duration::from_secs(60));

    player.seek(-3.0).await.unwrap();
    assert_eq!(
        source.calls().last(),
        Some(&Call::Seek(handle, Duration::ZERO))
    );
}

#[tokio::test]
async fn test_seek_while_stopped_is_ignored() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    player.seek(10.0).await.unwrap();
    assert!(source.calls().is_empty());
    assert_eq!(player.position(), Duration::ZERO);
}

#[tokio::test]
async fn test_preload_waits_for_ready() {
    let source = ScriptedSource::new();
    let player = player_with(
        &source,
        PlaybackSettings::default().with_preload_before_playing(true),
    );
    let handle = MediaHandle::new(1);

    player.play_from_beginning().await.unwrap();
    eventually(|| source.has_call(&Call::Seek(handle, Duration::ZERO))).await;
    // Barrier: the load report has been applied once a later command returns
    player.set_loops(false).await.unwrap();
    assert_eq!(player.playback_state(), PlaybackState::Stopped);
    assert_eq!(source.plays(), 0);

    source.emit(MediaEvent::Ready);
    wait_until(&player, |s| s.playback == PlaybackState::Playing).await;
    assert!(source.has_call(&Call::Play(handle)));
}

// ============================================================================
// End of Media
// ============================================================================

#[tokio::test]
async fn test_end_of_media_loops() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default().with_loops(true));
    let mut events = player.subscribe();
    start(&player).await;

    source.emit(MediaEvent::ReachedEnd);
    eventually(|| source.plays() == 2).await;
    assert_eq!(player.playback_state(), PlaybackState::Playing);
    assert_eq!(source.loads(), 1);

    let events = drain(&mut events);
    assert!(events.contains(&PlayerEvent::ReachedEnd));
    assert!(!events.contains(&PlayerEvent::PlaybackStopped));
}

#[tokio::test]
async fn test_end_of_media_freezes() {
    let source = ScriptedSource::new();
    let player = player_with(
        &source,
        PlaybackSettings::default().with_freeze_at_end(true),
    );
    start(&player).await;

    source.emit(MediaEvent::ReachedEnd);
    wait_until(&player, |s| s.playback == PlaybackState::Paused).await;
    assert!(source.has_call(&Call::Pause(MediaHandle::new(1))));
    assert!(!source.has_call(&Call::Stop(MediaHandle::new(1))));
}

#[tokio::test]
async fn test_end_of_media_stops_by_default() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;

    source.emit(MediaEvent::Progress {
        position: Duration::from_secs(59),
    });
    source.emit(MediaEvent::ReachedEnd);
    let snapshot = wait_until(&player, |s| s.playback == PlaybackState::Stopped).await;
    assert_eq!(snapshot.position, Duration::ZERO);
    assert!(source.has_call(&Call::Stop(MediaHandle::new(1))));
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_retries_exhausted_then_failed() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default().with_max_retries(2));
    let mut events = player.subscribe();
    start(&player).await;

    source.fail_next_loads(2);
    source.emit(MediaEvent::failed("decoder error"));

    let snapshot = wait_until(&player, |s| s.playback == PlaybackState::Failed).await;
    assert_eq!(snapshot.buffering, BufferingState::Unknown);
    assert_eq!(snapshot.retry_count, 3);
    assert_eq!(source.loads(), 3);

    let events = drain(&mut events);
    assert!(events.contains(&PlayerEvent::RetryScheduled {
        attempt: 1,
        max_retries: 2
    }));
    assert!(events.contains(&PlayerEvent::RetryScheduled {
        attempt: 2,
        max_retries: 2
    }));
    let failure = events
        .iter()
        .find_map(|event| match event {
            PlayerEvent::PlaybackFailed { reason } => Some(reason.clone()),
            _ => None,
        })
        .expect("failure notification");
    assert!(failure.contains("connection reset"));

    // No further automatic loads once failed
    sleep(Duration::from_millis(20)).await;
    assert_eq!(source.loads(), 3);
}

#[tokio::test]
async fn test_recovery_resumes_at_last_position() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    let mut transitions = player.subscribe().filter(PlayerEvent::is_playback_transition);
    start(&player).await;

    source.emit(MediaEvent::Progress {
        position: Duration::from_secs(42),
    });
    source.emit(MediaEvent::failed("stream interrupted"));

    let retried = MediaHandle::new(2);
    eventually(|| source.has_call(&Call::Play(retried))).await;
    assert!(source.has_call(&Call::Stop(MediaHandle::new(1))));
    assert!(source.has_call(&Call::Seek(retried, Duration::from_secs(42))));

    assert_eq!(player.retry_count(), 1);

    source.emit(MediaEvent::Ready);
    let snapshot = wait_until(&player, |s| s.retry_count == 0).await;
    assert_eq!(snapshot.playback, PlaybackState::Playing);

    // The host only ever saw the initial start
    assert_eq!(drain(&mut transitions), vec![PlayerEvent::PlaybackStarted]);
}

#[tokio::test]
async fn test_delayed_retry_waits() {
    let source = ScriptedSource::new();
    let player = player_with(
        &source,
        PlaybackSettings::default().with_retry_delay(Duration::from_millis(40)),
    );
    start(&player).await;

    source.emit(MediaEvent::failed("timeout"));
    player.set_loops(false).await.unwrap();
    assert_eq!(source.loads(), 1);
    assert_eq!(player.retry_count(), 1);

    eventually(|| source.has_call(&Call::Play(MediaHandle::new(2)))).await;
    assert_eq!(source.loads(), 2);
}

#[tokio::test]
async fn test_stop_cancels_delayed_retry() {
    let source = ScriptedSource::new();
    let player = player_with(
        &source,
        PlaybackSettings::default().with_retry_delay(Duration::from_millis(30)),
    );
    start(&player).await;

    source.emit(MediaEvent::failed("timeout"));
    player.set_loops(false).await.unwrap();
    player.stop().await.unwrap();

    sleep(Duration::from_millis(80)).await;
    assert_eq!(source.loads(), 1);
    assert_eq!(player.playback_state(), PlaybackState::Stopped);
    // The counter survives stop; the next play clears it
    assert_eq!(player.retry_count(), 1);

    player.play_from_beginning().await.unwrap();
    assert_eq!(player.retry_count(), 0);
}

#[tokio::test]
async fn test_stale_events_after_stop_are_ignored() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;
    let (old_handle, old_listener) = source.listener(0);

    player.stop().await.unwrap();
    old_listener.on_event(old_handle, MediaEvent::Ready);
    old_listener.on_event(old_handle, MediaEvent::failed("late failure"));
    // Barrier: queued engine events are applied before the next command
    player.pause().await.unwrap();

    let snapshot = player.snapshot();
    assert_eq!(snapshot.playback, PlaybackState::Stopped);
    assert_eq!(snapshot.buffering, BufferingState::Unknown);
    assert_eq!(snapshot.retry_count, 0);
    assert_eq!(source.loads(), 1);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_changing_asset_pauses_and_reloads() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;

    let next = AssetReference::file("/media/next-episode.mp4");
    player.set_asset(next.clone()).await.unwrap();
    assert_eq!(player.playback_state(), PlaybackState::Paused);
    assert!(source.has_call(&Call::Stop(MediaHandle::new(1))));

    player.play_from_current_time().await.unwrap();
    wait_until(&player, |s| s.playback == PlaybackState::Playing).await;
    assert!(source.has_call(&Call::Load(next)));

    player.clear_asset().await.unwrap();
    assert_eq!(player.playback_state(), PlaybackState::Stopped);
}

#[tokio::test]
async fn test_mute_is_forwarded() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;

    player.set_muted(true).await.unwrap();
    assert!(source.has_call(&Call::SetMuted(MediaHandle::new(1), true)));
}

#[tokio::test]
async fn test_frame_sink_follows_loads() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut sink = MockSink::new();
    let attached = Arc::clone(&log);
    sink.expect_attach()
        .returning(move |handle| attached.lock().push(format!("attach {handle}")));
    let filled = Arc::clone(&log);
    sink.expect_set_fill_mode()
        .returning(move |mode| filled.lock().push(format!("fill {mode}")));
    let detached = Arc::clone(&log);
    sink.expect_detach()
        .returning(move || detached.lock().push("detach".to_string()));

    let source = ScriptedSource::new();
    let config = PlayerConfig::builder()
        .media_source(source.clone())
        .frame_sink(Arc::new(sink))
        .settings(PlaybackSettings::default().with_fill_mode(FillMode::ResizeAspectFill))
        .asset(asset())
        .build()
        .unwrap();
    let player = VideoPlayer::new(config).unwrap();

    start(&player).await;
    player.set_fill_mode(FillMode::Resize).await.unwrap();
    player.stop().await.unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "attach media#1".to_string(),
            "fill resizeAspectFill".to_string(),
            "fill resize".to_string(),
            "detach".to_string(),
        ]
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_shutdown_closes_controller() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;

    player.shutdown().await.unwrap();
    assert!(source.has_call(&Call::Stop(MediaHandle::new(1))));
    assert_eq!(player.playback_state(), PlaybackState::Stopped);

    assert_eq!(
        player.play_from_beginning().await,
        Err(PlaybackError::ControllerClosed)
    );
    // Idempotent
    assert!(player.shutdown().await.is_ok());
}

#[tokio::test]
async fn test_dropping_player_stops_playback() {
    let source = ScriptedSource::new();
    let player = player_with(&source, PlaybackSettings::default());
    start(&player).await;

    drop(player);
    eventually(|| source.has_call(&Call::Stop(MediaHandle::new(1)))).await;
}

#[test]
fn test_new_requires_runtime() {
    let config = PlayerConfig::builder()
        .media_source(ScriptedSource::new())
        .build()
        .unwrap();
    assert!(matches!(
        VideoPlayer::new(config),
        Err(PlaybackError::Runtime(_))
    ));
}
