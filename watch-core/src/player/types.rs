//! Types for player state and events

use serde::{Deserialize, Serialize};

/// Player state as reported by the embedded video widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    /// Map a YouTube IFrame API state code (-1, 0, 1, 2, 3, 5)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(PlayerState::Unstarted),
            0 => Some(PlayerState::Ended),
            1 => Some(PlayerState::Playing),
            2 => Some(PlayerState::Paused),
            3 => Some(PlayerState::Buffering),
            5 => Some(PlayerState::Cued),
            _ => None,
        }
    }

    /// Whether the player is playing or about to continue playing
    pub fn is_active(self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Buffering)
    }
}

/// A state-changed event fired by the player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerEvent {
    pub state: PlayerState,
    /// Player position when the event fired, in seconds
    pub time_secs: f64,
}

impl PlayerEvent {
    pub fn new(state: PlayerState, time_secs: f64) -> Self {
        Self { state, time_secs }
    }
}
