//! Playback Adapter
//!
//! Contract the sync engine needs from the embedded video player.

mod adapter;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use adapter::{AdapterError, PlaybackAdapter};
pub use types::*;
