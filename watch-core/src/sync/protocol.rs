//! Sync Protocol Records
//!
//! Shapes of the records stored under a room. Field names on the wire are
//! camelCase so both clients (and any web client sharing the store) agree.

use serde::{Deserialize, Serialize};

/// Longest chat message accepted, in characters
pub const MAX_CHAT_LEN: usize = 500;

/// Shared playback record for a room (last writer wins)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Video identifier, empty when nothing is loaded
    #[serde(default)]
    pub media_id: String,
    /// Whether the video should be playing
    #[serde(default)]
    pub is_playing: bool,
    /// Position in seconds at `updated_at_ms`
    #[serde(default)]
    pub position_seconds: f64,
    /// Publish timestamp in milliseconds since UNIX epoch
    #[serde(default)]
    pub updated_at_ms: u64,
    /// Client id of the writer
    #[serde(default)]
    pub updated_by: String,
}

impl PlaybackState {
    /// State a room starts in: nothing loaded, paused at zero
    pub fn initial(created_by: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            media_id: String::new(),
            is_playing: false,
            position_seconds: 0.0,
            updated_at_ms: created_at_ms,
            updated_by: created_by.into(),
        }
    }

    /// Whether any video is loaded
    pub fn has_media(&self) -> bool {
        !self.media_id.is_empty()
    }

    /// Apply a patch on top of this state, leaving unset fields untouched
    pub fn merged(&self, patch: &StatePatch) -> Self {
        let mut next = self.clone();
        if let Some(media_id) = &patch.media_id {
            next.media_id = media_id.clone();
        }
        if let Some(is_playing) = patch.is_playing {
            next.is_playing = is_playing;
        }
        if let Some(position) = patch.position_seconds {
            next.position_seconds = position.max(0.0);
        }
        next
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::initial("", 0)
    }
}

/// Partial update produced by a local action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub media_id: Option<String>,
    pub is_playing: Option<bool>,
    pub position_seconds: Option<f64>,
}

impl StatePatch {
    pub fn play(position_seconds: f64) -> Self {
        Self {
            is_playing: Some(true),
            position_seconds: Some(position_seconds),
            ..Default::default()
        }
    }

    pub fn pause(position_seconds: f64) -> Self {
        Self {
            is_playing: Some(false),
            position_seconds: Some(position_seconds),
            ..Default::default()
        }
    }

    pub fn seek(position_seconds: f64, is_playing: bool) -> Self {
        Self {
            is_playing: Some(is_playing),
            position_seconds: Some(position_seconds),
            ..Default::default()
        }
    }

    /// New media always starts from the beginning
    pub fn load(media_id: impl Into<String>, autoplay: bool) -> Self {
        Self {
            media_id: Some(media_id.into()),
            is_playing: Some(autoplay),
            position_seconds: Some(0.0),
        }
    }
}

/// A chat message as stored in the room's chat collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Store-assigned key (not part of the stored body)
    #[serde(skip)]
    pub id: String,
    pub sender: String,
    pub text: String,
    pub sent_at_ms: u64,
}

/// Room record written once at creation, used to resolve room codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub room_code: String,
    pub created_at_ms: u64,
    pub created_by: String,
}

/// Opaque WebRTC signals relayed between the two participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CallSignal {
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    #[serde(rename_all = "camelCase")]
    Candidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    },
    Hangup,
}

/// Envelope for a call signal in the room's call collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    pub from: String,
    pub sent_at_ms: u64,
    pub signal: CallSignal,
}

/// Current time in milliseconds since UNIX epoch
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
