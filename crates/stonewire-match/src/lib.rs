//! Match orchestration for Stonewire.
//!
//! A [`Matchmaker`] resolves two externally-identified users to game
//! accounts, hosts a room through the [`RoomDirectory`], and drives the
//! match end to end: seating players as they join, relaying chat to the
//! [`Messenger`], and reporting the verdict. The injected
//! [`MatchRegistry`] enforces at most one active match per participant.
//!
//! # Key types
//!
//! - [`Matchmaker`] — match setup and the driver task
//! - [`MatchRegistry`] / [`AuthRegistry`] — injected shared state
//! - [`RoomDirectory`] / [`Messenger`] / [`IdentityStore`] — the
//!   collaborator boundaries the embedding application implements

mod collab;
mod error;
mod orchestrator;
mod registry;

pub use collab::{
    ExternalUser, HostedRoom, IdentityStore, Messenger, Profile,
    RoomDirectory,
};
pub use error::MatchError;
pub use orchestrator::{Matchmaker, JOIN_DEADLINE};
pub use registry::{AuthRegistry, MatchRegistry};
