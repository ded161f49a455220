//! Room Code Generation and Parsing
//!
//! Human-shareable codes that key a room's records in the store.

use std::fmt;

/// Characters used in room codes (uppercase letters and digits)
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Room code length (6 chars = ~2.2 billion combinations with 36-char alphabet)
const CODE_LENGTH: usize = 6;

/// A room code that can be shared to join a room
///
/// Freshly generated codes are not checked against existing rooms, so two
/// rooms can in principle end up sharing a code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a random room code
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let mut code = String::with_capacity(CODE_LENGTH);
        for _ in 0..CODE_LENGTH {
            let idx = rng.gen_range(0..ALPHABET.len());
            code.push(ALPHABET[idx] as char);
        }
        RoomCode(code)
    }

    /// Get the room code as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a room code from user input
    ///
    /// Normalizes to uppercase, drops separators and validates format.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| c.is_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.len() != CODE_LENGTH {
            return None;
        }

        if normalized.bytes().all(|b| ALPHABET.contains(&b)) {
            Some(RoomCode(normalized))
        } else {
            None
        }
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
