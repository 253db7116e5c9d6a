use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod pagination;
pub mod snapshot;
pub mod tracked_item;

// Re-exports for convenience
pub use pagination::*;
pub use snapshot::*;
pub use tracked_item::*;

/// The chat user a tracked item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub chat_id: i64,
    pub user_id: i64,
}

const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const SLUG_LENGTH: usize = 7;

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Random alphanumeric slug. Uniqueness is checked by the caller.
pub fn generate_slug() -> String {
    // Bytes 6 and 8 carry the uuid version and variant bits.
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != 6 && *index != 8)
        .take(SLUG_LENGTH)
        .map(|(_, byte)| SLUG_ALPHABET[*byte as usize % SLUG_ALPHABET.len()] as char)
        .collect()
}
