//! Shared wire protocol definitions for the roomcast relay.

pub mod event;
pub mod room;
pub mod session;
