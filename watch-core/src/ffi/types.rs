//! FFI types exposed via uniffi

use crate::player::{AdapterError, PlayerState as InternalPlayerState};
use crate::store::StoreError as InternalStoreError;
use crate::sync::{
    CallSignal as InternalCallSignal, ChatError, ChatMessage as InternalChatMessage,
    ConnectionState as InternalConnectionState, PlaybackState as InternalPlaybackState, RoomError,
    RoomState as InternalRoomState,
};

/// Error types exposed via FFI
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CoreError {
    #[error("Invalid room code")]
    InvalidRoomCode,

    #[error("Room not found")]
    RoomNotFound,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("Not a video id or YouTube link")]
    InvalidMediaId,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Player error: {0}")]
    PlayerError(String),
}

impl From<RoomError> for CoreError {
    fn from(e: RoomError) -> Self {
        match e {
            RoomError::InvalidCode => CoreError::InvalidRoomCode,
            RoomError::NotFound => CoreError::RoomNotFound,
            RoomError::Store(e) => CoreError::StoreError(e.to_string()),
        }
    }
}

impl From<ChatError> for CoreError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Store(e) => CoreError::StoreError(e.to_string()),
            other => CoreError::InvalidMessage(other.to_string()),
        }
    }
}

impl From<InternalStoreError> for CoreError {
    fn from(e: InternalStoreError) -> Self {
        CoreError::StoreError(e.to_string())
    }
}

/// Errors the native player can report back
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PlayerError {
    #[error("Player rejected command: {reason}")]
    Rejected { reason: String },

    #[error("Player is not ready")]
    Unavailable,
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PlayerError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        PlayerError::Rejected { reason: e.reason }
    }
}

impl From<PlayerError> for AdapterError {
    fn from(e: PlayerError) -> Self {
        match e {
            PlayerError::Rejected { reason } => AdapterError::Rejected(reason),
            PlayerError::Unavailable => AdapterError::Unavailable,
        }
    }
}

/// Player state exposed via FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl From<PlayerState> for InternalPlayerState {
    fn from(s: PlayerState) -> Self {
        match s {
            PlayerState::Unstarted => InternalPlayerState::Unstarted,
            PlayerState::Ended => InternalPlayerState::Ended,
            PlayerState::Playing => InternalPlayerState::Playing,
            PlayerState::Paused => InternalPlayerState::Paused,
            PlayerState::Buffering => InternalPlayerState::Buffering,
            PlayerState::Cued => InternalPlayerState::Cued,
        }
    }
}

/// Shared playback record exposed via FFI
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct PlaybackState {
    pub media_id: String,
    pub is_playing: bool,
    pub position_seconds: f64,
    pub updated_at_ms: u64,
    pub updated_by: String,
}

impl From<&InternalPlaybackState> for PlaybackState {
    fn from(p: &InternalPlaybackState) -> Self {
        Self {
            media_id: p.media_id.clone(),
            is_playing: p.is_playing,
            position_seconds: p.position_seconds,
            updated_at_ms: p.updated_at_ms,
            updated_by: p.updated_by.clone(),
        }
    }
}

/// Chat message exposed via FFI
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    pub sent_at_ms: u64,
}

impl From<&InternalChatMessage> for ChatMessage {
    fn from(m: &InternalChatMessage) -> Self {
        Self {
            id: m.id.clone(),
            sender: m.sender.clone(),
            text: m.text.clone(),
            sent_at_ms: m.sent_at_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Error,
}

impl From<InternalConnectionState> for ConnectionState {
    fn from(c: InternalConnectionState) -> Self {
        match c {
            InternalConnectionState::Connecting => ConnectionState::Connecting,
            InternalConnectionState::Connected => ConnectionState::Connected,
            InternalConnectionState::Error => ConnectionState::Error,
        }
    }
}

/// WebRTC signal relayed to the peer
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum CallSignal {
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Candidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    },
    Hangup,
}

impl From<CallSignal> for InternalCallSignal {
    fn from(s: CallSignal) -> Self {
        match s {
            CallSignal::Offer { sdp } => InternalCallSignal::Offer { sdp },
            CallSignal::Answer { sdp } => InternalCallSignal::Answer { sdp },
            CallSignal::Candidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => InternalCallSignal::Candidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            },
            CallSignal::Hangup => InternalCallSignal::Hangup,
        }
    }
}

impl From<InternalCallSignal> for CallSignal {
    fn from(s: InternalCallSignal) -> Self {
        match s {
            InternalCallSignal::Offer { sdp } => CallSignal::Offer { sdp },
            InternalCallSignal::Answer { sdp } => CallSignal::Answer { sdp },
            InternalCallSignal::Candidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => CallSignal::Candidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            },
            InternalCallSignal::Hangup => CallSignal::Hangup,
        }
    }
}

/// Room state exposed via FFI
#[derive(Debug, Clone, uniffi::Record)]
pub struct RoomState {
    pub room_code: String,
    pub client_id: String,
    pub display_name: String,
    pub playback: PlaybackState,
    pub chat: Vec<ChatMessage>,
    pub connection: ConnectionState,
    pub last_error: Option<String>,
}

impl From<&InternalRoomState> for RoomState {
    fn from(r: &InternalRoomState) -> Self {
        Self {
            room_code: r.room_code.clone(),
            client_id: r.client_id.clone(),
            display_name: r.display_name.clone(),
            playback: PlaybackState::from(&r.playback),
            chat: r.chat.iter().map(ChatMessage::from).collect(),
            connection: ConnectionState::from(r.connection),
            last_error: r.last_error.clone(),
        }
    }
}

/// Session settings chosen by the native app
#[derive(Debug, Clone, uniffi::Record)]
pub struct SessionConfig {
    /// ntfy server, `None` for the public one
    pub server_url: Option<String>,
    /// Echo suppression window after applying a peer's update
    pub settle_delay_ms: u64,
    /// Position disagreement tolerated before seeking
    pub seek_threshold_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let sync = crate::sync::SyncConfig::default();
        Self {
            server_url: None,
            settle_delay_ms: sync.settle_delay.as_millis() as u64,
            seek_threshold_secs: sync.seek_threshold_secs,
        }
    }
}

/// Callback interface for session events
#[uniffi::export(callback_interface)]
pub trait SessionCallback: Send + Sync {
    fn on_room_state_changed(&self, state: RoomState);
    fn on_playback_changed(&self, playback: PlaybackState);
    fn on_chat_messages(&self, messages: Vec<ChatMessage>);
    fn on_call_signals(&self, signals: Vec<CallSignal>);
    fn on_connection_state_changed(&self, state: ConnectionState);
    fn on_error(&self, message: String);
    fn on_disconnected(&self);
}

/// The embedded video player, implemented by the native app
#[uniffi::export(callback_interface)]
pub trait PlayerBridge: Send + Sync {
    fn current_time(&self) -> Result<f64, PlayerError>;
    fn play_state(&self) -> Result<PlayerState, PlayerError>;
    fn play(&self) -> Result<(), PlayerError>;
    fn pause(&self) -> Result<(), PlayerError>;
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<(), PlayerError>;
    /// Load and start `media_id` at `start_seconds`
    fn load_media(&self, media_id: String, start_seconds: f64) -> Result<(), PlayerError>;
}
