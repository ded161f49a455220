//! Outbound intents
//!
//! Translate what the local user did into engine reports.

use super::engine::{LocalOutcome, SyncEngine};
use crate::player::{PlayerEvent, PlayerState};

/// Length of a YouTube video id
const MEDIA_ID_LEN: usize = 11;

/// A local user action
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Play { position_secs: f64 },
    Pause { position_secs: f64 },
    Seek { position_secs: f64, is_playing: bool },
    Load { media_id: String },
}

impl Intent {
    /// Player events that correspond to user gestures. Buffering, cueing
    /// and the end of a video are not shared.
    pub fn from_player_event(event: PlayerEvent) -> Option<Self> {
        match event.state {
            PlayerState::Playing => Some(Intent::Play {
                position_secs: event.time_secs,
            }),
            PlayerState::Paused => Some(Intent::Pause {
                position_secs: event.time_secs,
            }),
            PlayerState::Buffering
            | PlayerState::Cued
            | PlayerState::Unstarted
            | PlayerState::Ended => None,
        }
    }
}

pub async fn send_play(engine: &mut SyncEngine, position_secs: f64) -> LocalOutcome {
    engine.report_local_play(position_secs).await
}

pub async fn send_pause(engine: &mut SyncEngine, position_secs: f64) -> LocalOutcome {
    engine.report_local_pause(position_secs).await
}

pub async fn send_seek(engine: &mut SyncEngine, position_secs: f64, is_playing: bool) -> LocalOutcome {
    engine.report_local_seek(position_secs, is_playing).await
}

/// New media always starts from zero and plays for both participants
pub async fn send_load(engine: &mut SyncEngine, media_id: &str) -> LocalOutcome {
    engine.report_local_media_load(media_id, true).await
}

pub async fn dispatch(engine: &mut SyncEngine, intent: Intent) -> LocalOutcome {
    match intent {
        Intent::Play { position_secs } => send_play(engine, position_secs).await,
        Intent::Pause { position_secs } => send_pause(engine, position_secs).await,
        Intent::Seek {
            position_secs,
            is_playing,
        } => send_seek(engine, position_secs, is_playing).await,
        Intent::Load { media_id } => send_load(engine, &media_id).await,
    }
}

/// Extract a video id from user input: a bare id or a YouTube link
/// (`watch?v=`, `youtu.be/`, `/embed/`, `/shorts/`)
pub fn normalize_media_id(input: &str) -> Option<String> {
    let input = input.trim();

    if !input.contains("youtu") {
        let valid = input.len() == MEDIA_ID_LEN && input.chars().all(is_id_char);
        return valid.then(|| input.to_string());
    }

    let candidate = input
        .split_once('?')
        .and_then(|(_, query)| query.split('&').find_map(|pair| pair.strip_prefix("v=")))
        .or_else(|| path_id(input))?;

    // Links carry trailing query or path parts after the id
    let id: String = candidate.chars().take_while(|c| is_id_char(*c)).collect();
    (id.len() == MEDIA_ID_LEN).then_some(id)
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn path_id(url: &str) -> Option<&str> {
    for marker in ["youtu.be/", "/embed/", "/shorts/"] {
        if let Some((_, rest)) = url.split_once(marker) {
            return Some(rest);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    use crate::player::fake::FakePlayer;
    use crate::store::MemoryStore;
    use crate::sync::{PlaybackState, SyncConfig};

    #[test]
    fn test_player_events_map_to_intents() {
        assert_eq!(
            Intent::from_player_event(PlayerEvent::new(PlayerState::Playing, 4.0)),
            Some(Intent::Play { position_secs: 4.0 })
        );
        assert_eq!(
            Intent::from_player_event(PlayerEvent::new(PlayerState::Paused, 9.5)),
            Some(Intent::Pause { position_secs: 9.5 })
        );
        assert_eq!(
            Intent::from_player_event(PlayerEvent::new(PlayerState::Buffering, 1.0)),
            None
        );
        assert_eq!(
            Intent::from_player_event(PlayerEvent::new(PlayerState::Ended, 1.0)),
            None
        );
    }

    #[test]
    fn test_normalize_media_id() {
        assert_eq!(normalize_media_id("abc12345678").as_deref(), Some("abc12345678"));
        assert_eq!(
            normalize_media_id(" https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42 ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            normalize_media_id("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            normalize_media_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            normalize_media_id("https://youtube.com/shorts/a_b-c123456").as_deref(),
            Some("a_b-c123456")
        );
        assert_eq!(normalize_media_id(""), None);
        assert_eq!(normalize_media_id("short"), None);
        assert_eq!(normalize_media_id("abc12345678 extra"), None);
        assert_eq!(normalize_media_id("https://youtube.com/"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_load_resets_position_and_plays() {
        let store = MemoryStore::new();
        let (tx, _errors) = mpsc::unbounded_channel();
        let mut engine = SyncEngine::new(
            "me",
            "rooms/TEST01/playback",
            Arc::new(store.clone()),
            Arc::new(FakePlayer::new()),
            SyncConfig::default(),
            tx,
        );

        send_pause(&mut engine, 75.0).await;
        assert_eq!(send_load(&mut engine, "abc12345678").await, LocalOutcome::Published);

        let written: PlaybackState =
            serde_json::from_value(store.snapshot("rooms/TEST01/playback").unwrap()).unwrap();
        assert_eq!(written.media_id, "abc12345678");
        assert!(written.is_playing);
        assert_eq!(written.position_seconds, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_routes_to_engine() {
        let store = MemoryStore::new();
        let (tx, _errors) = mpsc::unbounded_channel();
        let mut engine = SyncEngine::new(
            "me",
            "p",
            Arc::new(store.clone()),
            Arc::new(FakePlayer::new()),
            SyncConfig::default(),
            tx,
        );

        let outcome = dispatch(
            &mut engine,
            Intent::Seek {
                position_secs: 33.0,
                is_playing: false,
            },
        )
        .await;

        assert_eq!(outcome, LocalOutcome::Published);
        assert_eq!(engine.projection().position_seconds, 33.0);
        assert!(!engine.projection().is_playing);
    }
}
