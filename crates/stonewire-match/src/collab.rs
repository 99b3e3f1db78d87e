//! Collaborator boundaries the orchestrator depends on.
//!
//! The orchestrator never talks to a chat platform, a room-hosting
//! directory, or an identity database directly. It calls these traits,
//! and the embedding application supplies the implementations: real
//! clients in production, in-memory fakes in tests.

use std::future::Future;

use stonewire_protocol::{RoomServerInfo, UserId};

use crate::MatchError;

/// A user on the external messaging platform, before any game identity
/// has been resolved for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalUser {
    /// Platform-scoped user id.
    pub id: String,
    /// Which platform the id belongs to.
    pub platform: String,
    /// Display name on that platform.
    pub nickname: String,
}

impl ExternalUser {
    /// Globally unique key across platforms.
    pub fn key(&self) -> String {
        format!("{}:{}", self.platform, self.id)
    }
}

/// A game-service account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
}

/// A room created through the directory, with everything needed to
/// connect to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedRoom {
    /// Directory-assigned room id.
    pub id: String,
    /// Where and how to connect.
    pub server: RoomServerInfo,
    /// Room name at creation time.
    pub name: String,
}

/// The room-hosting service's admin/directory API.
///
/// Methods return `impl Future + Send` so generic orchestrator code can
/// be spawned onto the runtime regardless of the implementation.
pub trait RoomDirectory: Send + Sync + 'static {
    /// Creates a new room and returns its connection handle.
    fn create_room(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<HostedRoom, MatchError>> + Send;

    /// Lists the rooms currently hosted.
    fn fetch_rooms(
        &self,
    ) -> impl Future<Output = Result<Vec<HostedRoom>, MatchError>> + Send;

    /// Looks up one account by game id.
    fn user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Profile, MatchError>> + Send;

    /// Lists all accounts known to the service.
    fn list_users(
        &self,
    ) -> impl Future<Output = Result<Vec<Profile>, MatchError>> + Send;
}

/// The messaging channel match outcomes are reported to.
pub trait Messenger: Send + Sync + 'static {
    /// Posts a line of text to the channel.
    fn send(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), MatchError>> + Send;

    /// Renders a mention token for the given user.
    fn mention(&self, user: &ExternalUser) -> String;

    /// Human-readable channel name.
    fn name(&self) -> String;
}

/// Key/value store binding external users to game accounts.
pub trait IdentityStore: Send + Sync + 'static {
    /// Returns the bound game id, if any. An unassigned sentinel stored
    /// by [`set`](Self::set) reads back as `None`.
    fn get(
        &self,
        user: &ExternalUser,
    ) -> impl Future<Output = Result<Option<UserId>, MatchError>> + Send;

    /// Binds (or with the unassigned sentinel, unbinds) a game id.
    fn set(
        &self,
        user: &ExternalUser,
        id: UserId,
    ) -> impl Future<Output = Result<(), MatchError>> + Send;
}
