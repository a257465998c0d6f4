//! Room identifiers and their validation rules.
//!
//! Room names are chosen by clients, so the relay validates them at the
//! boundary before they touch the registry. Wire events carry the room as a
//! plain `String`; [`RoomId::parse`] is the single place the rules live, so
//! they are testable without a live network stack.

use serde::{Deserialize, Serialize};

/// Maximum allowed length of a room identifier in bytes.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Errors produced when a client-supplied room identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomIdError {
    /// The identifier was empty.
    #[error("room id must not be empty")]
    Empty,
    /// The identifier exceeded [`MAX_ROOM_ID_LEN`] bytes.
    #[error("room id exceeds {MAX_ROOM_ID_LEN} bytes")]
    TooLong,
    /// The identifier contained a character outside `[A-Za-z0-9_.-]`.
    #[error("room id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// A validated room identifier.
///
/// Only constructible through [`RoomId::parse`], which enforces the
/// `[A-Za-z0-9_.-]{1,64}` pattern. This lets the registry key its maps on
/// identifiers that are known-good.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Parses and validates a client-supplied room identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`RoomIdError`] if the string is empty, too long, or
    /// contains a character outside `[A-Za-z0-9_.-]`.
    pub fn parse(s: &str) -> Result<Self, RoomIdError> {
        if s.is_empty() {
            return Err(RoomIdError::Empty);
        }
        if s.len() > MAX_ROOM_ID_LEN {
            return Err(RoomIdError::TooLong);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '.' | '-'))
        {
            return Err(RoomIdError::InvalidChar(c));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
