//! Room directory
//!
//! Creates rooms and resolves user-entered codes to existing ones.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::protocol::{current_time_ms, PlaybackState, RoomRecord};
use crate::store::{RemoteStore, RoomCode, RoomPaths, StoreError};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Invalid room code")]
    InvalidCode,

    #[error("Room not found")]
    NotFound,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct RoomDirectory {
    store: Arc<dyn RemoteStore>,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Create a room: its record plus an empty, paused playback state
    pub async fn create_room(&self, created_by: &str) -> Result<RoomCode, RoomError> {
        let code = RoomCode::random();
        let paths = RoomPaths::new(&code);
        let now = current_time_ms();

        let record = RoomRecord {
            room_code: code.to_string(),
            created_at_ms: now,
            created_by: created_by.to_string(),
        };
        self.store
            .publish(&paths.meta, serde_json::to_value(&record).map_err(StoreError::from)?)
            .await?;

        let playback = PlaybackState::initial(created_by, now);
        self.store
            .publish(&paths.playback, serde_json::to_value(&playback).map_err(StoreError::from)?)
            .await?;

        info!("Created room {}", code);
        Ok(code)
    }

    /// Resolve a code typed by the user to an existing room
    pub async fn lookup(&self, input: &str) -> Result<RoomCode, RoomError> {
        let code = RoomCode::parse(input).ok_or(RoomError::InvalidCode)?;
        let paths = RoomPaths::new(&code);

        match self.store.read_once(&paths.meta).await? {
            Some(_) => Ok(code),
            None => Err(RoomError::NotFound),
        }
    }
}
