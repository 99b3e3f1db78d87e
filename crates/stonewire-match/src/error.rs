//! Error types for match orchestration.

use stonewire_room::RoomError;

/// Errors surfaced by the [`Matchmaker`](crate::Matchmaker) and its
/// collaborators.
///
/// Collaborator traits report their failures through the string-carrying
/// variants (`Directory`, `Messenger`, `Identity`); implementations map
/// their own error types into those.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The named participant is already registered in an active match.
    #[error("{0} is already in a match")]
    AlreadyPlaying(String),

    /// Both seats resolved to the same participant.
    #[error("{0} cannot play against themselves")]
    SelfMatch(String),

    /// The named participants have no game account bound.
    #[error("{0} not found on the game service")]
    Unregistered(String),

    /// The named participant already has a game account bound.
    #[error("{0} is already bound to a game account")]
    AlreadyBound(String),

    /// An authentication for the named participant is still pending.
    #[error("an authentication for {0} is already in progress")]
    AuthPending(String),

    /// The room directory collaborator failed.
    #[error("room directory error: {0}")]
    Directory(String),

    /// The messaging channel collaborator failed.
    #[error("messaging channel error: {0}")]
    Messenger(String),

    /// The identity store collaborator failed.
    #[error("identity store error: {0}")]
    Identity(String),

    /// A room connection operation failed.
    #[error(transparent)]
    Room(#[from] RoomError),
}
