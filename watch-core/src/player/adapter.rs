//! Player adapter trait

use async_trait::async_trait;
use thiserror::Error;

use super::types::PlayerState;

/// Errors a player can report for a command
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Player rejected command: {0}")]
    Rejected(String),

    #[error("Player is not ready")]
    Unavailable,
}

/// The embedded video player, seen from the sync engine
///
/// Commands are fire-and-forget: a successful return only means the player
/// accepted the command. The resulting state-changed events arrive later,
/// through whatever channel the host UI uses to report player events.
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Current position in seconds
    async fn current_time(&self) -> Result<f64, AdapterError>;

    /// Current player state
    async fn play_state(&self) -> Result<PlayerState, AdapterError>;

    /// Resume playback
    async fn play(&self) -> Result<(), AdapterError>;

    /// Pause playback
    async fn pause(&self) -> Result<(), AdapterError>;

    /// Seek to a position in seconds
    ///
    /// # Arguments
    /// * `seconds` - Target position
    /// * `allow_seek_ahead` - Whether the player may fetch unbuffered data
    async fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<(), AdapterError>;

    /// Load and start a video. Loading implies playing; pausing afterwards
    /// needs a separate command.
    async fn load_media(&self, media_id: &str, start_seconds: f64) -> Result<(), AdapterError>;
}
