//! Unified error type for the Stonewire crates.

use stonewire_match::MatchError;
use stonewire_protocol::ProtocolError;
use stonewire_room::RoomError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `stonewire` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum StonewireError {
    /// A wire-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room connection error (state, permission, I/O).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A match orchestration error (registry, collaborators).
    #[error(transparent)]
    Match(#[from] MatchError),
}
