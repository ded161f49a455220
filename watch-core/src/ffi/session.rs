//! Session implementation for FFI

use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::player::{PlayerEvent, PlayerState as InternalPlayerState};
use crate::store::{NtfyConfig, NtfyStore, RemoteStore, RoomCode, RoomPaths};
use crate::sync::{
    new_client_id, normalize_media_id, CallSignaling, ChatReconciler, Intent, LocalOutcome, Room,
    RoomDirectory, RoomState as InternalRoomState, SyncConfig, SyncEngine,
};

use super::handlers::{current_callback, run_room, BridgeAdapter, RoomCommand, RoomTask, SharedCallback, SharedPlayer};
use super::types::*;

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("watch_core=debug,hyper=off,hyper_util=off,reqwest=off")
        });
        // Another subscriber may already be installed by the host app
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(false)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Handles to the task driving the room we are in
struct ActiveRoom {
    code: RoomCode,
    commands: mpsc::UnboundedSender<RoomCommand>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    chat: Arc<ChatReconciler>,
    call: Arc<CallSignaling>,
}

/// Main session interface
#[derive(uniffi::Object)]
pub struct Session {
    runtime: Runtime,
    store: Arc<dyn RemoteStore>,
    sync_config: SyncConfig,
    client_id: String,
    room: Arc<RwLock<Room>>,
    callback: SharedCallback,
    player: SharedPlayer,
    active: RwLock<Option<ActiveRoom>>,
}

#[uniffi::export]
impl Session {
    /// Create a session against the public ntfy server
    #[uniffi::constructor]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    #[uniffi::constructor]
    pub fn with_config(config: SessionConfig) -> Self {
        let mut ntfy = NtfyConfig::default();
        if let Some(url) = config.server_url {
            ntfy.base_url = url;
        }

        let sync_config = SyncConfig {
            seek_threshold_secs: config.seek_threshold_secs,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            ..SyncConfig::default()
        };

        Self::with_store(Arc::new(NtfyStore::with_config(ntfy)), sync_config)
    }

    /// Set the event callback
    pub fn set_callback(&self, callback: Box<dyn SessionCallback>) {
        *self.callback.write() = Some(Arc::from(callback));
    }

    /// Register the embedded player. Commands fail with "not ready" until
    /// one is set.
    pub fn set_player(&self, player: Box<dyn PlayerBridge>) {
        *self.player.write() = Some(Arc::from(player));
    }

    pub fn client_id(&self) -> String {
        self.client_id.clone()
    }

    /// Create a new room and enter it
    pub fn create_room(&self, display_name: String) -> Result<String, CoreError> {
        self.begin_joining(None)?;

        let directory = RoomDirectory::new(Arc::clone(&self.store));
        let result = self
            .runtime
            .block_on(directory.create_room(&self.client_id))
            .map_err(CoreError::from)
            .and_then(|code| self.enter_room(code, display_name));

        match result {
            Ok(code) => {
                info!("Created room: {}", code);
                Ok(code.to_string())
            }
            Err(e) => {
                warn!("Failed to create room: {}", e);
                *self.room.write() = Room::None;
                Err(e)
            }
        }
    }

    /// Join an existing room by its code
    pub fn join_room(&self, room_code: String, display_name: String) -> Result<(), CoreError> {
        self.begin_joining(Some(room_code.clone()))?;

        let directory = RoomDirectory::new(Arc::clone(&self.store));
        let result = self
            .runtime
            .block_on(directory.lookup(&room_code))
            .map_err(CoreError::from)
            .and_then(|code| self.enter_room(code, display_name));

        match result {
            Ok(code) => {
                info!("Joined room: {}", code);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to join room {}: {}", room_code, e);
                *self.room.write() = Room::None;
                Err(e)
            }
        }
    }

    /// Leave the current room
    pub fn leave_room(&self) -> Result<(), CoreError> {
        let active = self.active.write().take();
        let Some(mut active) = active else {
            return Err(CoreError::NotInRoom);
        };

        if let Some(cancel) = active.cancel.take() {
            let _ = cancel.send(());
        }
        // Subscriptions are dropped when the task returns
        let _ = self.runtime.block_on(active.task);

        *self.room.write() = Room::None;

        if let Some(cb) = current_callback(&self.callback) {
            cb.on_disconnected();
        }

        info!("Left room {}", active.code);
        Ok(())
    }

    pub fn send_play(&self, position_secs: f64) -> Result<(), CoreError> {
        self.dispatch(Intent::Play { position_secs })
    }

    pub fn send_pause(&self, position_secs: f64) -> Result<(), CoreError> {
        self.dispatch(Intent::Pause { position_secs })
    }

    pub fn send_seek(&self, position_secs: f64, is_playing: bool) -> Result<(), CoreError> {
        self.dispatch(Intent::Seek {
            position_secs,
            is_playing,
        })
    }

    /// Load a video for both participants. Accepts a video id or a YouTube link.
    pub fn send_load(&self, media: String) -> Result<(), CoreError> {
        let media_id = normalize_media_id(&media).ok_or(CoreError::InvalidMediaId)?;
        self.dispatch(Intent::Load { media_id })
    }

    /// Forward a state-changed event from the embedded player
    pub fn handle_player_event(&self, state: PlayerState, time_secs: f64) -> Result<(), CoreError> {
        match Intent::from_player_event(PlayerEvent::new(state.into(), time_secs)) {
            Some(intent) => self.dispatch(intent),
            None => Ok(()),
        }
    }

    /// Forward a raw YouTube IFrame state code from the embedded player
    pub fn handle_player_state_code(&self, code: i32, time_secs: f64) -> Result<(), CoreError> {
        let state = InternalPlayerState::from_code(code)
            .ok_or_else(|| CoreError::PlayerError(format!("Unknown player state code {}", code)))?;
        match Intent::from_player_event(PlayerEvent::new(state, time_secs)) {
            Some(intent) => self.dispatch(intent),
            None => Ok(()),
        }
    }

    pub fn send_chat_message(&self, text: String) -> Result<ChatMessage, CoreError> {
        let chat = self
            .active
            .read()
            .as_ref()
            .map(|a| Arc::clone(&a.chat))
            .ok_or(CoreError::NotInRoom)?;

        let message = self.runtime.block_on(chat.send(&text))?;
        Ok(ChatMessage::from(&message))
    }

    pub fn send_call_signal(&self, signal: CallSignal) -> Result<(), CoreError> {
        let call = self
            .active
            .read()
            .as_ref()
            .map(|a| Arc::clone(&a.call))
            .ok_or(CoreError::NotInRoom)?;

        self.runtime.block_on(call.send(signal.into()))?;
        Ok(())
    }

    /// Get current room state
    pub fn get_room_state(&self) -> Option<RoomState> {
        self.room.read().state().map(RoomState::from)
    }

    pub fn get_playback_state(&self) -> Option<PlaybackState> {
        self.room.read().state().map(|s| PlaybackState::from(&s.playback))
    }

    pub fn get_chat_messages(&self) -> Vec<ChatMessage> {
        self.room
            .read()
            .state()
            .map(|s| s.chat.iter().map(ChatMessage::from).collect())
            .unwrap_or_default()
    }

    pub fn get_connection_state(&self) -> Option<ConnectionState> {
        self.room.read().state().map(|s| ConnectionState::from(s.connection))
    }

    pub fn get_last_error(&self) -> Option<String> {
        self.room.read().state().and_then(|s| s.last_error.clone())
    }

    pub fn dismiss_error(&self) {
        if let Some(state) = self.room.write().state_mut() {
            state.dismiss_error();
        }
    }

    /// Check if we are in a room
    pub fn is_in_room(&self) -> bool {
        self.room.read().is_active()
    }
}

impl Session {
    /// Session over any store, used by tests and embedders
    pub fn with_store(store: Arc<dyn RemoteStore>, sync_config: SyncConfig) -> Self {
        init_tracing();

        let client_id = new_client_id();
        info!("Initializing watch-core session {}", client_id);

        let runtime = Runtime::new().expect("Failed to create tokio runtime");

        Self {
            runtime,
            store,
            sync_config,
            client_id,
            room: Arc::new(RwLock::new(Room::None)),
            callback: Arc::new(RwLock::new(None)),
            player: Arc::new(RwLock::new(None)),
            active: RwLock::new(None),
        }
    }

    fn begin_joining(&self, room_code: Option<String>) -> Result<(), CoreError> {
        let mut room = self.room.write();
        if room.is_busy() {
            return Err(CoreError::AlreadyInRoom);
        }
        *room = Room::Joining { room_code };
        Ok(())
    }

    /// Subscribe to the room's paths and start the task that drives it
    fn enter_room(&self, code: RoomCode, display_name: String) -> Result<RoomCode, CoreError> {
        let paths = RoomPaths::new(&code);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let engine = SyncEngine::new(
            self.client_id.clone(),
            paths.playback.clone(),
            Arc::clone(&self.store),
            Arc::new(BridgeAdapter::new(Arc::clone(&self.player))),
            self.sync_config.clone(),
            error_tx,
        );

        let sender = if display_name.trim().is_empty() {
            self.client_id.clone()
        } else {
            display_name.trim().to_string()
        };
        let chat = Arc::new(ChatReconciler::new(Arc::clone(&self.store), paths.chat.clone(), sender));
        let call = Arc::new(CallSignaling::new(
            Arc::clone(&self.store),
            paths.call.clone(),
            self.client_id.clone(),
        ));

        let (playback, chat_feed, call_feed) = self.runtime.block_on(async {
            let playback = self.store.subscribe(&paths.playback).await?;
            let chat_feed = chat.subscribe().await?;
            let call_feed = call.subscribe().await?;
            Ok::<_, CoreError>((playback, chat_feed, call_feed))
        })?;

        *self.room.write() = Room::Active(InternalRoomState::new(
            code.to_string(),
            self.client_id.clone(),
            display_name,
        ));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let task = self.runtime.spawn(run_room(RoomTask {
            engine,
            playback,
            chat: chat_feed,
            call: call_feed,
            commands: command_rx,
            errors: error_rx,
            cancel: cancel_rx,
            room: Arc::clone(&self.room),
            callback: Arc::clone(&self.callback),
        }));

        *self.active.write() = Some(ActiveRoom {
            code: code.clone(),
            commands: command_tx,
            cancel: Some(cancel_tx),
            task,
            chat,
            call,
        });

        if let Some(cb) = current_callback(&self.callback) {
            if let Some(state) = self.get_room_state() {
                cb.on_room_state_changed(state);
            }
        }

        Ok(code)
    }

    /// Hand an intent to the room task and wait until it has been handled.
    /// Store failures surface through `on_error`, not here.
    fn dispatch(&self, intent: Intent) -> Result<(), CoreError> {
        let commands = self
            .active
            .read()
            .as_ref()
            .map(|a| a.commands.clone())
            .ok_or(CoreError::NotInRoom)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        commands
            .send(RoomCommand {
                intent,
                reply: reply_tx,
            })
            .map_err(|_| CoreError::NotInRoom)?;

        let outcome = self.runtime.block_on(reply_rx).map_err(|_| CoreError::NotInRoom)?;
        if outcome == LocalOutcome::Suppressed {
            debug!("Local intent dropped as player echo");
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.get_mut().take() {
            if let Some(cancel) = active.cancel.take() {
                let _ = cancel.send(());
            }
        }
    }
}
