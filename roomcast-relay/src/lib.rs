//! Roomcast relay server library.
//!
//! Exposes the relay server for use in tests and embedding. The relay
//! accepts WebSocket connections, tracks room membership in a
//! [`rooms::RoomRegistry`], and fans each message out to every session in
//! the sender's room.

pub mod config;
pub mod relay;
pub mod rooms;
