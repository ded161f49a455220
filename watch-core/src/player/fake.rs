//! Recording player for tests

use async_trait::async_trait;
use parking_lot::Mutex;

use super::adapter::{AdapterError, PlaybackAdapter};
use super::types::PlayerState;

/// A command the fake player received
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    SeekTo(f64),
    Load { media_id: String, start_seconds: f64 },
}

#[derive(Debug)]
struct FakeState {
    time: f64,
    state: PlayerState,
    media_id: String,
    commands: Vec<PlayerCommand>,
    reject_loads: bool,
}

/// Player that applies commands instantly and records them
#[derive(Debug)]
pub struct FakePlayer {
    inner: Mutex<FakeState>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::with_state(0.0, PlayerState::Unstarted)
    }

    pub fn with_state(time: f64, state: PlayerState) -> Self {
        Self {
            inner: Mutex::new(FakeState {
                time,
                state,
                media_id: String::new(),
                commands: Vec::new(),
                reject_loads: false,
            }),
        }
    }

    pub fn set_position(&self, time: f64, state: PlayerState) {
        let mut inner = self.inner.lock();
        inner.time = time;
        inner.state = state;
    }

    pub fn reject_loads(&self, reject: bool) {
        self.inner.lock().reject_loads = reject;
    }

    pub fn commands(&self) -> Vec<PlayerCommand> {
        self.inner.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.inner.lock().commands.clear();
    }

    pub fn media_id(&self) -> String {
        self.inner.lock().media_id.clone()
    }

    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    pub fn seek_count(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, PlayerCommand::SeekTo(_)))
            .count()
    }
}

#[async_trait]
impl PlaybackAdapter for FakePlayer {
    async fn current_time(&self) -> Result<f64, AdapterError> {
        Ok(self.inner.lock().time)
    }

    async fn play_state(&self) -> Result<PlayerState, AdapterError> {
        Ok(self.inner.lock().state)
    }

    async fn play(&self) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.commands.push(PlayerCommand::Play);
        inner.state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&self) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.commands.push(PlayerCommand::Pause);
        inner.state = PlayerState::Paused;
        Ok(())
    }

    async fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.commands.push(PlayerCommand::SeekTo(seconds));
        inner.time = seconds;
        Ok(())
    }

    async fn load_media(&self, media_id: &str, start_seconds: f64) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        if inner.reject_loads {
            return Err(AdapterError::Rejected(format!("invalid media id {}", media_id)));
        }
        inner.commands.push(PlayerCommand::Load {
            media_id: media_id.to_string(),
            start_seconds,
        });
        inner.media_id = media_id.to_string();
        inner.time = start_seconds;
        inner.state = PlayerState::Playing;
        Ok(())
    }
}
