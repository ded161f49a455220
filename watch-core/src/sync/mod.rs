//! Room Synchronization
//!
//! Keeps playback, chat and call signaling consistent between the two
//! participants of a room.

mod call;
mod chat;
mod engine;
mod intent;
mod protocol;
mod rooms;
mod state;

pub use call::{CallFeed, CallSignaling};
pub use chat::{order_messages, validate_text, ChatError, ChatFeed, ChatReconciler};
pub use engine::*;
pub use intent::*;
pub use protocol::*;
pub use rooms::{RoomDirectory, RoomError};
pub use state::*;
