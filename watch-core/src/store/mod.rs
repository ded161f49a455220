//! Remote Store
//!
//! The shared real-time key-value service rooms live in, plus the backends
//! this crate ships with.

mod memory;
mod ntfy;
mod remote;
mod room_code;

pub use memory::MemoryStore;
pub use ntfy::{NtfyConfig, NtfyStore};
pub use remote::{RemoteStore, RoomPaths, StoreError, Subscription};
pub use room_code::RoomCode;
