//! Room connection layer for Stonewire.
//!
//! A [`RoomConnection`] owns one TCP stream to a room server. A single
//! reader task turns the byte stream into typed events, applies them to
//! the room state, and fans them out on per-kind broadcast channels.
//! Callers issue typed commands through the connection handle; local
//! precondition failures are rejected synchronously with no bytes sent.
//!
//! # Key types
//!
//! - [`RoomConnection`] — the connection handle and command surface
//! - [`RoomState`] / [`ConnectionState`] — live room data and lifecycle
//! - [`RoomEvents`] — typed subscription point per event kind
//! - [`await_event`] — bounded wait for a qualifying event

mod connection;
mod error;
mod events;
mod state;
mod wait;

pub use connection::{RoomConnection, CONF_ACK_TIMEOUT};
pub use error::RoomError;
pub use events::{ChatLine, GameEnd, GameStart, RoomEvents};
pub use state::{ConnectionState, RoomState};
pub use wait::{await_event, WaitError};
