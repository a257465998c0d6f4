//! Relay wire events, postcard-encoded over WebSocket binary frames.
//!
//! The protocol is deliberately small: a client joins a named room and sends
//! opaque text payloads; the relay fans each payload out to every session in
//! the sender's room. Disconnection is a transport-level close, not a wire
//! event.

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Error type for event encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Events sent by a client to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Join the named room, leaving any previously joined room.
    ///
    /// The relay confirms with [`ServerEvent::Joined`] to the joining
    /// session only.
    Join {
        /// Room identifier; must match `[A-Za-z0-9_.-]{1,64}`.
        room: String,
    },

    /// Broadcast a payload to the sender's current room.
    ///
    /// The payload is opaque to the relay — plain text or JSON, never
    /// parsed or validated. Ignored if the sender has not joined a room.
    Message {
        /// Opaque message payload.
        payload: String,
    },
}

/// Events sent by the relay to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// Sent once when the connection is accepted, carrying the
    /// server-assigned session identifier.
    Welcome {
        /// Identifier assigned to this session.
        session_id: SessionId,
    },

    /// Confirms a join; delivered to the joining session only.
    Joined {
        /// The room that was joined.
        room: String,
    },

    /// A payload broadcast to the room, including back to the sender.
    Message {
        /// Opaque message payload.
        payload: String,
    },

    /// The relay rejected an event (invalid room id, oversized payload).
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`ClientEvent`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the event cannot be serialized.
pub fn encode_client(event: &ClientEvent) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ClientEvent`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized.
pub fn decode_client(bytes: &[u8]) -> Result<ClientEvent, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`ServerEvent`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the event cannot be serialized.
pub fn encode_server(event: &ServerEvent) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ServerEvent`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized.
pub fn decode_server(bytes: &[u8]) -> Result<ServerEvent, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
