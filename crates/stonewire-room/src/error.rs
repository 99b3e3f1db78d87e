//! Error types for the room connection layer.

use stonewire_protocol::ProtocolError;

/// Errors surfaced by [`RoomConnection`](crate::RoomConnection)
/// operations.
///
/// The command-rejection variants (`NotConnected` through
/// `SeatsUnfilled`) are synchronous local failures: the precondition
/// check ran before anything was written, so no bytes went out.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Opening the stream to the room server failed.
    #[error("failed to reach room server: {0}")]
    Connect(#[source] std::io::Error),

    /// The connection is not in the `Connected` state.
    #[error("not connected to a room")]
    NotConnected,

    /// The connection has been closed.
    #[error("connection closed")]
    Closed,

    /// The caller is not the room owner.
    #[error("only the room owner may do this")]
    NotOwner,

    /// The operation is not allowed while a game is in progress.
    #[error("game already in progress")]
    InGame,

    /// The operation requires a game in progress.
    #[error("no game in progress")]
    NotInGame,

    /// The caller is not seated as black or white.
    #[error("caller is not seated")]
    NotSeated,

    /// Both seats must be assigned before the game can start.
    #[error("both seats must be assigned to start")]
    SeatsUnfilled,

    /// The room snapshot did not arrive within the given window.
    #[error("room snapshot not received within {0:?}")]
    NoSnapshot(std::time::Duration),

    /// The server did not echo the requested conf within the
    /// confirmation window. The command was still sent; room state is
    /// unknown and the caller may retry.
    #[error("conf change unconfirmed after {0:?}")]
    ConfUnconfirmed(std::time::Duration),

    /// Writing to the stream failed.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Encoding an outbound command failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
