//! Room task and player bridge plumbing

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::player::{AdapterError, PlaybackAdapter, PlayerState as InternalPlayerState};
use crate::store::Subscription;
use crate::sync::{
    dispatch, CallFeed, ChatFeed, ChatMessage as InternalChatMessage, ConnectionState as InternalConnectionState,
    Intent, LocalOutcome, RemoteOutcome, Room, SyncEngine, SyncError,
};

use super::types::{
    CallSignal, ChatMessage, ConnectionState, PlaybackState, PlayerBridge, RoomState, SessionCallback,
};

pub(crate) type SharedCallback = Arc<RwLock<Option<Arc<dyn SessionCallback>>>>;
pub(crate) type SharedPlayer = Arc<RwLock<Option<Arc<dyn PlayerBridge>>>>;

/// Current callback, cloned out so it is never invoked under the lock
pub(crate) fn current_callback(callback: &SharedCallback) -> Option<Arc<dyn SessionCallback>> {
    callback.read().clone()
}

/// Adapter over whatever player the native app has registered
pub(crate) struct BridgeAdapter {
    player: SharedPlayer,
}

impl BridgeAdapter {
    pub(crate) fn new(player: SharedPlayer) -> Self {
        Self { player }
    }

    fn bridge(&self) -> Result<Arc<dyn PlayerBridge>, AdapterError> {
        self.player.read().clone().ok_or(AdapterError::Unavailable)
    }
}

#[async_trait]
impl PlaybackAdapter for BridgeAdapter {
    async fn current_time(&self) -> Result<f64, AdapterError> {
        Ok(self.bridge()?.current_time()?)
    }

    async fn play_state(&self) -> Result<InternalPlayerState, AdapterError> {
        Ok(self.bridge()?.play_state()?.into())
    }

    async fn play(&self) -> Result<(), AdapterError> {
        Ok(self.bridge()?.play()?)
    }

    async fn pause(&self) -> Result<(), AdapterError> {
        Ok(self.bridge()?.pause()?)
    }

    async fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<(), AdapterError> {
        Ok(self.bridge()?.seek_to(seconds, allow_seek_ahead)?)
    }

    async fn load_media(&self, media_id: &str, start_seconds: f64) -> Result<(), AdapterError> {
        Ok(self.bridge()?.load_media(media_id.to_string(), start_seconds)?)
    }
}

/// Local action handed to the room task
pub(crate) struct RoomCommand {
    pub intent: Intent,
    pub reply: oneshot::Sender<LocalOutcome>,
}

/// Everything the room task owns
pub(crate) struct RoomTask {
    pub engine: SyncEngine,
    pub playback: Subscription,
    pub chat: ChatFeed,
    pub call: CallFeed,
    pub commands: mpsc::UnboundedReceiver<RoomCommand>,
    pub errors: mpsc::UnboundedReceiver<SyncError>,
    pub cancel: oneshot::Receiver<()>,
    pub room: Arc<RwLock<Room>>,
    pub callback: SharedCallback,
}

/// Drive one room until cancelled or the session goes away.
///
/// All engine calls happen on this task, so store deliveries, local intents
/// and the settle timer are handled one at a time.
pub(crate) async fn run_room(task: RoomTask) {
    let RoomTask {
        mut engine,
        mut playback,
        mut chat,
        mut call,
        mut commands,
        mut errors,
        mut cancel,
        room,
        callback,
    } = task;

    let mut playback_open = true;
    let mut chat_open = true;
    let mut call_open = true;

    info!("Room task started");
    set_connection(&room, &callback, InternalConnectionState::Connected);

    loop {
        let deadline = engine.settle_deadline();

        tokio::select! {
            _ = &mut cancel => {
                debug!("Room task cancelled");
                break;
            }

            value = playback.recv(), if playback_open => match value {
                Some(value) => {
                    if let Some(RemoteOutcome::Applied | RemoteOutcome::OwnEcho) =
                        engine.on_remote_value(value).await
                    {
                        publish_playback(&engine, &room, &callback);
                    }
                }
                None => {
                    warn!("Subscription {} ended", playback.path());
                    playback_open = false;
                    set_connection(&room, &callback, InternalConnectionState::Error);
                }
            },

            messages = chat.next(), if chat_open => match messages {
                Some(messages) => handle_chat(messages, &room, &callback),
                None => {
                    warn!("Chat subscription ended");
                    chat_open = false;
                    set_connection(&room, &callback, InternalConnectionState::Error);
                }
            },

            signals = call.next(), if call_open => match signals {
                Some(signals) => {
                    debug!("Received {} call signal(s)", signals.len());
                    if let Some(cb) = current_callback(&callback) {
                        cb.on_call_signals(signals.into_iter().map(CallSignal::from).collect());
                    }
                }
                None => {
                    warn!("Call subscription ended");
                    call_open = false;
                }
            },

            command = commands.recv() => match command {
                Some(RoomCommand { intent, reply }) => {
                    let outcome = dispatch(&mut engine, intent).await;
                    // Errors from this command are settled before the reply
                    while let Ok(error) = errors.try_recv() {
                        handle_error(error, &room, &callback);
                    }
                    if outcome != LocalOutcome::Suppressed {
                        publish_playback(&engine, &room, &callback);
                    }
                    if outcome == LocalOutcome::Published && playback_open && chat_open {
                        set_connection(&room, &callback, InternalConnectionState::Connected);
                    }
                    let _ = reply.send(outcome);
                }
                None => break,
            },

            Some(error) = errors.recv() => handle_error(error, &room, &callback),

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                engine.settle();
            }
        }
    }

    engine.shutdown();
    info!("Room task ended");
}

/// Push the engine's projection into the room state and the UI
fn publish_playback(engine: &SyncEngine, room: &Arc<RwLock<Room>>, callback: &SharedCallback) {
    let playback = engine.projection().clone();
    {
        let mut room_guard = room.write();
        if let Some(state) = room_guard.state_mut() {
            state.update_playback(playback.clone());
        }
    }

    if let Some(cb) = current_callback(callback) {
        cb.on_playback_changed(PlaybackState::from(&playback));
    }
}

fn handle_chat(messages: Vec<InternalChatMessage>, room: &Arc<RwLock<Room>>, callback: &SharedCallback) {
    let ffi_messages: Vec<ChatMessage> = messages.iter().map(ChatMessage::from).collect();
    {
        let mut room_guard = room.write();
        if let Some(state) = room_guard.state_mut() {
            state.update_chat(messages);
        }
    }

    if let Some(cb) = current_callback(callback) {
        cb.on_chat_messages(ffi_messages);
    }
}

/// Errors are shown as a dismissible notice and never stop the room.
/// A failed write marks the connection as errored until the next publish
/// goes through.
fn handle_error(error: SyncError, room: &Arc<RwLock<Room>>, callback: &SharedCallback) {
    let message = error.to_string();
    warn!("Sync error: {}", message);

    if matches!(error, SyncError::Transient(_)) {
        set_connection(room, callback, InternalConnectionState::Error);
    }

    {
        let mut room_guard = room.write();
        if let Some(state) = room_guard.state_mut() {
            state.record_error(message.clone());
        }
    }

    if let Some(cb) = current_callback(callback) {
        cb.on_error(message);
    }
}

fn set_connection(room: &Arc<RwLock<Room>>, callback: &SharedCallback, connection: InternalConnectionState) {
    let snapshot = {
        let mut room_guard = room.write();
        match room_guard.state_mut() {
            Some(state) => state
                .set_connection(connection)
                .then(|| RoomState::from(&*state)),
            None => None,
        }
    };

    if let Some(state) = snapshot {
        debug!("Connection state: {:?}", connection);
        if let Some(cb) = current_callback(callback) {
            cb.on_connection_state_changed(ConnectionState::from(connection));
            cb.on_room_state_changed(state);
        }
    }
}
