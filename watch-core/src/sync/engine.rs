//! Sync Engine
//!
//! Decides, for one client, when a local player transition becomes a publish
//! and when a record from the store is pushed into the local player.
//!
//! Player commands come back later as state-changed events that look exactly
//! like user gestures. After applying a peer's record the engine therefore
//! stays in a settle window during which local reports are dropped, so those
//! echoes are never published back to the room.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::protocol::{current_time_ms, PlaybackState, StatePatch};
use crate::player::{AdapterError, PlaybackAdapter};
use crate::store::{RemoteStore, StoreError};

/// Position disagreement (seconds) below which no corrective seek is issued
pub const DEFAULT_SEEK_THRESHOLD_SECS: f64 = 2.0;

/// How long player events are treated as echoes after a remote apply.
/// Must exceed the time the player takes to report the resulting events.
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(750);

/// Wait between loading media and pausing it. Loading always starts
/// playback, so a paused record needs a follow-up pause.
const DEFAULT_LOAD_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Tunables for the engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Seek only when the player is further than this from the record
    pub seek_threshold_secs: f64,
    /// Length of the echo suppression window
    pub settle_delay: Duration,
    /// Delay before the follow-up pause after a load
    pub load_settle_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            seek_threshold_secs: DEFAULT_SEEK_THRESHOLD_SECS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            load_settle_delay: DEFAULT_LOAD_SETTLE_DELAY,
        }
    }
}

/// Errors reported on the engine's error channel
#[derive(Debug, Error)]
pub enum SyncError {
    /// The store rejected a write. Local state is kept; the next local
    /// action publishes again.
    #[error("Failed to publish playback state: {0}")]
    Transient(#[from] StoreError),

    #[error("Player rejected {command}: {source}")]
    AdapterCommand {
        command: &'static str,
        #[source]
        source: AdapterError,
    },
}

/// Where the engine is relative to player commands it issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Local reports are published
    Idle,
    /// Player commands for a remote record are being issued
    CommandPending,
    /// Commands issued; events fired before `until` are echoes
    Suppressed { until: Instant },
}

/// What `on_remote_update` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Not newer than the last applied record
    Stale,
    /// Our own write coming back from the store
    OwnEcho,
    /// A peer's record, pushed into the player
    Applied,
}

/// What a `report_local_*` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    Published,
    /// Dropped as an echo of a remote apply
    Suppressed,
    /// Kept locally, but the store write failed (see error channel)
    Failed,
}

/// Reconciliation bookkeeping for one client.
///
/// `last_applied_ms` never decreases and covers our own publishes as well
/// as applied remote records. `known_media_id` is the media the player was
/// last told to load. Publishing only happens in `Phase::Idle`.
#[derive(Debug, Clone)]
struct EngineState {
    local: PlaybackState,
    last_applied_ms: u64,
    known_media_id: String,
    phase: Phase,
}

/// Per-client owner of the shared playback record
pub struct SyncEngine {
    client_id: String,
    playback_path: String,
    store: Arc<dyn RemoteStore>,
    player: Arc<dyn PlaybackAdapter>,
    config: SyncConfig,
    state: EngineState,
    errors: mpsc::UnboundedSender<SyncError>,
}

impl SyncEngine {
    pub fn new(
        client_id: impl Into<String>,
        playback_path: impl Into<String>,
        store: Arc<dyn RemoteStore>,
        player: Arc<dyn PlaybackAdapter>,
        config: SyncConfig,
        errors: mpsc::UnboundedSender<SyncError>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            playback_path: playback_path.into(),
            store,
            player,
            config,
            state: EngineState {
                local: PlaybackState::default(),
                last_applied_ms: 0,
                known_media_id: String::new(),
                phase: Phase::Idle,
            },
            errors,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The local projection of the room's playback record
    pub fn projection(&self) -> &PlaybackState {
        &self.state.local
    }

    pub fn last_applied_ms(&self) -> u64 {
        self.state.last_applied_ms
    }

    pub fn known_media_id(&self) -> &str {
        &self.state.known_media_id
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// When the current settle window ends, if one is open
    pub fn settle_deadline(&self) -> Option<Instant> {
        match self.state.phase {
            Phase::Suppressed { until } => Some(until),
            _ => None,
        }
    }

    /// Whether local reports are currently dropped. Closes an expired
    /// settle window on the way.
    pub fn is_suppressed(&mut self) -> bool {
        match self.state.phase {
            Phase::Idle => false,
            Phase::CommandPending => true,
            Phase::Suppressed { until } => {
                if Instant::now() >= until {
                    debug!("Settle window closed");
                    self.state.phase = Phase::Idle;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Settle timer fired
    pub fn settle(&mut self) {
        self.is_suppressed();
    }

    /// Drop any open settle window (room view going away)
    pub fn shutdown(&mut self) {
        self.state.phase = Phase::Idle;
    }

    pub async fn report_local_play(&mut self, position_secs: f64) -> LocalOutcome {
        self.report_local(StatePatch::play(position_secs)).await
    }

    pub async fn report_local_pause(&mut self, position_secs: f64) -> LocalOutcome {
        self.report_local(StatePatch::pause(position_secs)).await
    }

    pub async fn report_local_seek(&mut self, position_secs: f64, is_playing: bool) -> LocalOutcome {
        self.report_local(StatePatch::seek(position_secs, is_playing)).await
    }

    /// The local user picked new media. The player is loaded right away;
    /// our own echo then finds the media already known.
    pub async fn report_local_media_load(&mut self, media_id: &str, autoplay: bool) -> LocalOutcome {
        if self.is_suppressed() {
            debug!("Dropping local load of {} during settle window", media_id);
            return LocalOutcome::Suppressed;
        }

        let outcome = self.report_local(StatePatch::load(media_id, autoplay)).await;

        self.state.phase = Phase::CommandPending;
        self.load_into_player(media_id, 0.0, autoplay).await;
        self.arm_settle();

        outcome
    }

    async fn report_local(&mut self, patch: StatePatch) -> LocalOutcome {
        if self.is_suppressed() {
            debug!("Dropping local report during settle window: {:?}", patch);
            return LocalOutcome::Suppressed;
        }

        let mut next = self.state.local.merged(&patch);
        next.updated_at_ms = self.next_timestamp();
        next.updated_by = self.client_id.clone();

        // Optimistic: the projection moves now and is not rolled back if
        // the write fails
        self.state.local = next.clone();
        self.state.last_applied_ms = next.updated_at_ms;

        self.publish(&next).await
    }

    /// Wall clock, but always past anything already applied so a local
    /// action never loses to the record it reacts to
    fn next_timestamp(&self) -> u64 {
        current_time_ms().max(self.state.last_applied_ms + 1)
    }

    async fn publish(&self, state: &PlaybackState) -> LocalOutcome {
        let value = match serde_json::to_value(state) {
            Ok(value) => value,
            Err(e) => {
                self.report(SyncError::Transient(e.into()));
                return LocalOutcome::Failed;
            }
        };

        match self.store.publish(&self.playback_path, value).await {
            Ok(()) => {
                debug!(
                    "Published playback: media={} playing={} pos={:.1} at {}",
                    state.media_id, state.is_playing, state.position_seconds, state.updated_at_ms
                );
                LocalOutcome::Published
            }
            Err(e) => {
                warn!("Publish failed, keeping local state: {}", e);
                self.report(SyncError::Transient(e));
                LocalOutcome::Failed
            }
        }
    }

    /// Handle a raw value delivered by the playback subscription
    pub async fn on_remote_value(&mut self, value: Value) -> Option<RemoteOutcome> {
        match serde_json::from_value::<PlaybackState>(value) {
            Ok(state) => Some(self.on_remote_update(state).await),
            Err(e) => {
                warn!("Ignoring malformed playback record: {}", e);
                None
            }
        }
    }

    /// Reconcile a record delivered by the store
    pub async fn on_remote_update(&mut self, state: PlaybackState) -> RemoteOutcome {
        if state.updated_at_ms <= self.state.last_applied_ms {
            debug!(
                "Ignoring stale playback record ({} <= {})",
                state.updated_at_ms, self.state.last_applied_ms
            );
            return RemoteOutcome::Stale;
        }

        if state.updated_by == self.client_id {
            if state.has_media() && state.media_id != self.state.known_media_id {
                info!("Own record carries media {} the player has not loaded", state.media_id);
                self.state.phase = Phase::CommandPending;
                self.load_into_player(&state.media_id, state.position_seconds, state.is_playing)
                    .await;
                self.arm_settle();
            }
            self.state.last_applied_ms = state.updated_at_ms;
            self.state.local = state;
            return RemoteOutcome::OwnEcho;
        }

        info!(
            "Applying remote playback from {}: media={} playing={} pos={:.1}",
            state.updated_by, state.media_id, state.is_playing, state.position_seconds
        );

        self.state.phase = Phase::CommandPending;

        if state.media_id != self.state.known_media_id {
            // New media wins over the seek/play/pause fields
            if state.has_media() {
                self.load_into_player(&state.media_id, state.position_seconds, state.is_playing)
                    .await;
            } else {
                let result = self.player.pause().await;
                self.check("pause", result);
                self.state.known_media_id.clear();
            }
        } else if state.has_media() {
            self.align_player(&state).await;
        }

        self.state.last_applied_ms = state.updated_at_ms;
        self.state.local = state;
        self.arm_settle();

        RemoteOutcome::Applied
    }

    /// Bring the player in line with a record for the media it already has
    async fn align_player(&self, state: &PlaybackState) {
        match self.player.current_time().await {
            Ok(current) => {
                let drift = (current - state.position_seconds).abs();
                if drift > self.config.seek_threshold_secs {
                    debug!("Drift {:.3}s, seeking to {:.1}", drift, state.position_seconds);
                    let result = self.player.seek_to(state.position_seconds, true).await;
                    self.check("seek", result);
                }
            }
            Err(e) => self.report(SyncError::AdapterCommand {
                command: "current time",
                source: e,
            }),
        }

        match self.player.play_state().await {
            Ok(player_state) => {
                if state.is_playing && !player_state.is_active() {
                    let result = self.player.play().await;
                    self.check("play", result);
                } else if !state.is_playing && player_state.is_active() {
                    let result = self.player.pause().await;
                    self.check("pause", result);
                }
            }
            Err(e) => self.report(SyncError::AdapterCommand {
                command: "play state",
                source: e,
            }),
        }
    }

    /// Load media and pause it afterwards if it should not be playing.
    /// `known_media_id` only moves when the player accepted the load.
    async fn load_into_player(&mut self, media_id: &str, start_seconds: f64, playing: bool) {
        match self.player.load_media(media_id, start_seconds).await {
            Ok(()) => {
                self.state.known_media_id = media_id.to_string();
                if !playing {
                    tokio::time::sleep(self.config.load_settle_delay).await;
                    let result = self.player.pause().await;
                    self.check("pause", result);
                }
            }
            Err(e) => {
                warn!("Player failed to load {}: {}", media_id, e);
                self.report(SyncError::AdapterCommand {
                    command: "load",
                    source: e,
                });
            }
        }
    }

    /// Open (or extend) the settle window from now
    fn arm_settle(&mut self) {
        let until = Instant::now() + self.config.settle_delay;
        self.state.phase = Phase::Suppressed { until };
    }

    fn check(&self, command: &'static str, result: Result<(), AdapterError>) {
        if let Err(source) = result {
            warn!("Player rejected {}: {}", command, source);
            self.report(SyncError::AdapterCommand { command, source });
        }
    }

    fn report(&self, error: SyncError) {
        let _ = self.errors.send(error);
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("client_id", &self.client_id)
            .field("playback_path", &self.playback_path)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::fake::{FakePlayer, PlayerCommand};
    use crate::player::PlayerState;
    use crate::store::{MemoryStore, Subscription};

    const PATH: &str = "rooms/TEST01/playback";

    struct Client {
        engine: SyncEngine,
        player: Arc<FakePlayer>,
        errors: mpsc::UnboundedReceiver<SyncError>,
    }

    fn client(id: &str, store: &MemoryStore) -> Client {
        let player = Arc::new(FakePlayer::new());
        let (tx, errors) = mpsc::unbounded_channel();
        let engine = SyncEngine::new(
            id,
            PATH,
            Arc::new(store.clone()),
            player.clone(),
            SyncConfig::default(),
            tx,
        );
        Client {
            engine,
            player,
            errors,
        }
    }

    fn peer_record(media_id: &str, is_playing: bool, position: f64, at: u64) -> PlaybackState {
        PlaybackState {
            media_id: media_id.to_string(),
            is_playing,
            position_seconds: position,
            updated_at_ms: at,
            updated_by: "peer".to_string(),
        }
    }

    /// Client with `media_id` already loaded and its settle window closed
    async fn client_with_media(store: &MemoryStore, media_id: &str) -> Client {
        let mut c = client("me", store);
        c.engine.on_remote_update(peer_record(media_id, true, 0.0, 10)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        c.player.clear_commands();
        c
    }

    async fn pump(engine: &mut SyncEngine, sub: &mut Subscription) {
        while let Some(value) = sub.try_recv() {
            engine.on_remote_value(value).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_drift_pauses_without_seek() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;
        c.player.set_position(41.995, PlayerState::Playing);

        let outcome = c.engine.on_remote_update(peer_record("vid", false, 42.0, 100)).await;

        assert_eq!(outcome, RemoteOutcome::Applied);
        assert_eq!(c.player.commands(), vec![PlayerCommand::Pause]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_threshold_boundary() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;

        // Exactly 2.0s apart: left alone
        c.player.set_position(10.0, PlayerState::Playing);
        c.engine.on_remote_update(peer_record("vid", true, 12.0, 100)).await;
        assert_eq!(c.player.seek_count(), 0);

        // Just past the threshold: corrected
        c.player.set_position(10.0, PlayerState::Playing);
        c.engine.on_remote_update(peer_record("vid", true, 12.01, 200)).await;
        assert_eq!(c.player.commands(), vec![PlayerCommand::SeekTo(12.01)]);

        // Behind works the same way
        c.player.clear_commands();
        c.player.set_position(30.0, PlayerState::Playing);
        c.engine.on_remote_update(peer_record("vid", true, 20.0, 300)).await;
        assert_eq!(c.player.commands(), vec![PlayerCommand::SeekTo(20.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_issued_when_player_paused() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;
        c.player.set_position(5.0, PlayerState::Paused);

        c.engine.on_remote_update(peer_record("vid", true, 5.5, 100)).await;
        assert_eq!(c.player.commands(), vec![PlayerCommand::Play]);

        // Buffering already counts as playing
        c.player.clear_commands();
        c.player.set_position(6.0, PlayerState::Buffering);
        c.engine.on_remote_update(peer_record("vid", true, 6.0, 200)).await;
        assert!(c.player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_update_discarded() {
        let store = MemoryStore::new();
        let mut c = client("me", &store);

        assert_eq!(
            c.engine.on_remote_update(peer_record("vid", true, 0.0, 100)).await,
            RemoteOutcome::Applied
        );
        let after_first = c.player.commands();

        assert_eq!(
            c.engine.on_remote_update(peer_record("old", false, 9.0, 90)).await,
            RemoteOutcome::Stale
        );
        assert_eq!(c.player.commands(), after_first);
        assert_eq!(c.engine.projection().media_id, "vid");
        assert_eq!(c.engine.last_applied_ms(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_applied_once() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;
        c.player.set_position(0.0, PlayerState::Playing);

        let record = peer_record("vid", false, 60.0, 100);
        c.engine.on_remote_update(record.clone()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        c.player.set_position(0.0, PlayerState::Playing);
        let outcome = c.engine.on_remote_update(record).await;

        assert_eq!(outcome, RemoteOutcome::Stale);
        assert_eq!(
            c.player.commands(),
            vec![PlayerCommand::SeekTo(60.0), PlayerCommand::Pause]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_echo_not_published() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;
        c.player.set_position(3.0, PlayerState::Playing);

        c.engine.on_remote_update(peer_record("vid", false, 40.0, 100)).await;
        assert!(matches!(c.engine.phase(), Phase::Suppressed { .. }));

        // The seek and pause come back as player events
        assert_eq!(c.engine.report_local_seek(40.0, true).await, LocalOutcome::Suppressed);
        assert_eq!(c.engine.report_local_pause(40.0).await, LocalOutcome::Suppressed);
        assert!(store.writes(PATH).is_empty());

        tokio::time::advance(DEFAULT_SETTLE_DELAY + Duration::from_millis(1)).await;
        assert_eq!(c.engine.report_local_play(40.0).await, LocalOutcome::Published);
        assert_eq!(store.writes(PATH).len(), 1);
        assert_eq!(c.engine.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_remote_updates_extend_window() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;

        c.engine.on_remote_update(peer_record("vid", true, 1.0, 100)).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        c.engine.on_remote_update(peer_record("vid", true, 1.5, 200)).await;
        tokio::time::advance(Duration::from_millis(500)).await;

        assert!(c.engine.is_suppressed());
        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(!c.engine.is_suppressed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_change_wins_over_other_fields() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;
        c.player.set_position(100.0, PlayerState::Playing);

        c.engine.on_remote_update(peer_record("next", false, 7.0, 100)).await;

        assert_eq!(
            c.player.commands(),
            vec![
                PlayerCommand::Load {
                    media_id: "next".to_string(),
                    start_seconds: 7.0
                },
                PlayerCommand::Pause,
            ]
        );
        assert_eq!(c.engine.known_media_id(), "next");
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_report_publishes_merged_state() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;

        assert_eq!(c.engine.report_local_pause(12.5).await, LocalOutcome::Published);

        let written: PlaybackState =
            serde_json::from_value(store.snapshot(PATH).unwrap()).unwrap();
        assert_eq!(written.media_id, "vid");
        assert!(!written.is_playing);
        assert_eq!(written.position_seconds, 12.5);
        assert_eq!(written.updated_by, "me");
        assert!(written.updated_at_ms > 10);
        assert_eq!(&written, c.engine.projection());

        // Local reports never touch the player
        assert!(c.player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamps_stay_ahead_of_applied_records() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;

        // Peer clock far ahead of ours
        let far_future = current_time_ms() + 60_000;
        c.engine.on_remote_update(peer_record("vid", true, 0.0, far_future)).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        c.engine.report_local_pause(1.0).await;
        assert_eq!(c.engine.projection().updated_at_ms, far_future + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_keeps_local_state() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;
        store.set_offline(true);

        assert_eq!(c.engine.report_local_pause(8.0).await, LocalOutcome::Failed);
        assert!(!c.engine.projection().is_playing);
        assert_eq!(c.engine.projection().position_seconds, 8.0);
        assert!(matches!(
            c.errors.try_recv(),
            Ok(SyncError::Transient(StoreError::Offline))
        ));

        // Next action retries naturally
        store.set_offline(false);
        assert_eq!(c.engine.report_local_play(8.0).await, LocalOutcome::Published);
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_echo_leaves_player_alone() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;
        let mut sub = store.subscribe(PATH).await.unwrap();

        c.engine.report_local_play(3.0).await;
        let echo = sub.recv().await.unwrap();

        assert_eq!(c.engine.on_remote_value(echo).await, Some(RemoteOutcome::Stale));
        assert!(c.player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_record_with_unloaded_media_loads_it() {
        let store = MemoryStore::new();
        let mut c = client_with_media(&store, "vid").await;

        // e.g. written by this client id from another device
        let mut record = peer_record("other", true, 0.0, 500);
        record.updated_by = "me".to_string();
        assert_eq!(c.engine.on_remote_update(record.clone()).await, RemoteOutcome::OwnEcho);
        assert_eq!(
            c.player.commands(),
            vec![PlayerCommand::Load {
                media_id: "other".to_string(),
                start_seconds: 0.0
            }]
        );
        assert_eq!(c.engine.known_media_id(), "other");

        // Same media again: nothing to do
        c.player.clear_commands();
        record.updated_at_ms = 600;
        assert_eq!(c.engine.on_remote_update(record).await, RemoteOutcome::OwnEcho);
        assert!(c.player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_load_reported() {
        let store = MemoryStore::new();
        let mut c = client("me", &store);
        c.player.reject_loads(true);

        let outcome = c.engine.on_remote_update(peer_record("bad", true, 0.0, 100)).await;

        assert_eq!(outcome, RemoteOutcome::Applied);
        assert_eq!(c.engine.known_media_id(), "");
        assert_eq!(c.engine.projection().media_id, "bad");
        assert!(matches!(
            c.errors.try_recv(),
            Ok(SyncError::AdapterCommand { command: "load", .. })
        ));

        // A later record for the same media retries the load
        c.player.reject_loads(false);
        c.engine.on_remote_update(peer_record("bad", true, 0.0, 200)).await;
        assert_eq!(c.engine.known_media_id(), "bad");
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_load_drives_player_and_suppresses_its_events() {
        let store = MemoryStore::new();
        let mut c = client("me", &store);

        let outcome = c.engine.report_local_media_load("abc12345678", true).await;

        assert_eq!(outcome, LocalOutcome::Published);
        assert_eq!(
            c.player.commands(),
            vec![PlayerCommand::Load {
                media_id: "abc12345678".to_string(),
                start_seconds: 0.0
            }]
        );
        // The player's resulting "playing" event is an echo
        assert_eq!(c.engine.report_local_play(0.2).await, LocalOutcome::Suppressed);
        assert_eq!(store.writes(PATH).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_load_reaches_peer() {
        let store = MemoryStore::new();
        let mut one = client("one", &store);
        let mut two = client("two", &store);
        let mut sub_two = store.subscribe(PATH).await.unwrap();

        one.engine.report_local_media_load("abc12345678", true).await;
        pump(&mut two.engine, &mut sub_two).await;

        let projection = two.engine.projection();
        assert_eq!(projection.media_id, "abc12345678");
        assert!(projection.is_playing);
        assert_eq!(projection.position_seconds, 0.0);
        assert_eq!(two.player.media_id(), "abc12345678");
        assert_eq!(two.player.state(), PlayerState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_clients_converge() {
        let store = MemoryStore::new();
        let mut one = client("one", &store);
        let mut two = client("two", &store);
        let mut sub_one = store.subscribe(PATH).await.unwrap();
        let mut sub_two = store.subscribe(PATH).await.unwrap();

        async fn settle(
            one: &mut Client,
            two: &mut Client,
            sub_one: &mut Subscription,
            sub_two: &mut Subscription,
        ) {
            pump(&mut one.engine, sub_one).await;
            pump(&mut two.engine, sub_two).await;
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        one.engine.report_local_media_load("first", true).await;
        settle(&mut one, &mut two, &mut sub_one, &mut sub_two).await;

        two.player.set_position(14.0, PlayerState::Paused);
        two.engine.report_local_pause(14.0).await;
        settle(&mut one, &mut two, &mut sub_one, &mut sub_two).await;

        one.engine.report_local_seek(90.0, true).await;
        settle(&mut one, &mut two, &mut sub_one, &mut sub_two).await;

        two.engine.report_local_media_load("second", true).await;
        settle(&mut one, &mut two, &mut sub_one, &mut sub_two).await;

        one.player.set_position(3.0, PlayerState::Paused);
        one.engine.report_local_pause(3.0).await;
        settle(&mut one, &mut two, &mut sub_one, &mut sub_two).await;

        let latest: PlaybackState = serde_json::from_value(store.snapshot(PATH).unwrap()).unwrap();
        for c in [&one, &two] {
            assert_eq!(c.engine.projection(), &latest);
            assert_eq!(c.engine.known_media_id(), latest.media_id);
            assert_eq!(c.player.media_id(), "second");
            assert!(!c.player.state().is_active());
        }
    }
}
