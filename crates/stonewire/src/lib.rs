//! # Stonewire
//!
//! Client library and match orchestrator for a remote turn-based
//! stone-board game service spoken over newline-delimited JSON frames
//! on a plain TCP stream.
//!
//! The workspace splits into three layers, all re-exported here:
//!
//! - [`stonewire_protocol`]: frame codec and the typed event/command
//!   model.
//! - [`stonewire_room`]: the per-room connection state machine, typed
//!   event subscriptions, and the bounded [`await_event`] primitive.
//! - [`stonewire_match`]: the [`Matchmaker`] that pairs users, hosts a
//!   room, and drives a match from join phase to verdict.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stonewire::{RoomConnection, RoomServerInfo, UserId};
//!
//! # async fn run() -> Result<(), stonewire::StonewireError> {
//! let server = RoomServerInfo {
//!     addr: "127.0.0.1:7474".into(),
//!     invite: "invite-token".into(),
//! };
//! let room = RoomConnection::connect(&server, UserId(7)).await?;
//! room.await_ready(Duration::from_secs(5)).await?;
//! room.send_chat("hello").await?;
//! room.close().await;
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::StonewireError;
pub use stonewire_match::{
    AuthRegistry, ExternalUser, HostedRoom, IdentityStore, MatchError,
    MatchRegistry, Matchmaker, Messenger, Profile, RoomDirectory,
    JOIN_DEADLINE,
};
pub use stonewire_protocol::{
    encode_command, encode_record, Board, ClientCommand, ConfPatch,
    FrameReader, GameRule,
    ProtocolError, RoomConf, RoomServerInfo, RoomSnapshot, ServerEvent, Turn,
    UserId,
};
pub use stonewire_room::{
    await_event, ChatLine, ConnectionState, GameEnd, GameStart,
    RoomConnection, RoomError, RoomEvents, RoomState, WaitError,
    CONF_ACK_TIMEOUT,
};
