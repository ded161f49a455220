//! Watch Together - Core Library
//!
//! This library keeps two embedded video players in step through a shared
//! real-time store, with a chat log and call signaling alongside.

pub mod ffi;
pub mod player;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use player::{PlaybackAdapter, PlayerEvent, PlayerState};
pub use store::{MemoryStore, NtfyStore, RemoteStore, RoomCode};
pub use sync::{ChatReconciler, Room, RoomState, SyncConfig, SyncEngine};

// Setup uniffi scaffolding
uniffi::setup_scaffolding!();
