//! Room State Management

use super::protocol::{ChatMessage, PlaybackState};

/// How the room's subscriptions are doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// A subscription ended or the last write failed
    Error,
}

/// What the UI shows for the room we are in
#[derive(Debug, Clone)]
pub struct RoomState {
    /// Room code for sharing
    pub room_code: String,
    /// Our client ID
    pub client_id: String,
    pub display_name: String,
    /// Last playback record reconciled by the engine
    pub playback: PlaybackState,
    /// Full conversation in send order
    pub chat: Vec<ChatMessage>,
    pub connection: ConnectionState,
    /// Most recent error, until dismissed
    pub last_error: Option<String>,
}

impl RoomState {
    pub fn new(room_code: String, client_id: String, display_name: String) -> Self {
        Self {
            room_code,
            client_id,
            display_name,
            playback: PlaybackState::default(),
            chat: Vec::new(),
            connection: ConnectionState::Connecting,
            last_error: None,
        }
    }

    /// Update playback state
    pub fn update_playback(&mut self, playback: PlaybackState) {
        self.playback = playback;
    }

    /// Replace the conversation with a newer snapshot
    pub fn update_chat(&mut self, messages: Vec<ChatMessage>) {
        self.chat = messages;
    }

    /// Returns true if the state changed
    pub fn set_connection(&mut self, connection: ConnectionState) -> bool {
        if self.connection == connection {
            return false;
        }
        self.connection = connection;
        true
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }
}

/// Represents the room we're in (or not)
#[derive(Debug, Default)]
pub enum Room {
    /// Not in any room
    #[default]
    None,
    /// Creating or resolving a room
    Joining { room_code: Option<String> },
    /// In an active room
    Active(RoomState),
}

impl Room {
    /// Check if we're in an active room
    pub fn is_active(&self) -> bool {
        matches!(self, Room::Active(_))
    }

    /// Check if we're in any room-related state (joining or active)
    pub fn is_busy(&self) -> bool {
        !matches!(self, Room::None)
    }

    /// Get the active room state if we're in one
    pub fn state(&self) -> Option<&RoomState> {
        match self {
            Room::Active(state) => Some(state),
            _ => None,
        }
    }

    /// Get mutable reference to active room state
    pub fn state_mut(&mut self) -> Option<&mut RoomState> {
        match self {
            Room::Active(state) => Some(state),
            _ => None,
        }
    }
}

/// Random identifier for this client, stable for the session
pub fn new_client_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}
