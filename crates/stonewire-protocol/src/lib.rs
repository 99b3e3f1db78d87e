//! Wire protocol for Stonewire.
//!
//! This crate defines the "language" spoken between a client and a room
//! server:
//!
//! - **Types** ([`ServerEvent`], [`ClientCommand`], [`RoomConf`], etc.) —
//!   the records that travel on the wire.
//! - **Framing** ([`FrameReader`], [`encode_command`]) — newline-delimited
//!   UTF-8 JSON, one record per line.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding a single frame.
//!
//! # Architecture
//!
//! The protocol layer sits between the raw TCP stream and the room
//! connection. It knows nothing about sockets or room state; it only
//! knows how to turn byte chunks into typed events and typed commands
//! into bytes.
//!
//! ```text
//! TCP stream (bytes) → Protocol (ServerEvent) → Room connection (state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{encode_command, encode_record, FrameReader};
pub use error::ProtocolError;
pub use types::{
    Board, ClientCommand, ConfPatch, GameRule, RoomConf, RoomServerInfo,
    RoomSnapshot, ServerEvent, Turn, UserId,
};
