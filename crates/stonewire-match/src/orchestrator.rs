//! The matchmaker: pairs two externally-identified users, hosts a room
//! for them, shepherds the match from join to verdict, and reports to
//! the messaging channel.
//!
//! One driver task per match owns the room connection for its lifetime.
//! Every exit path (normal end, join timeout, lost connection, internal
//! error) funnels through the same teardown: close the room, release
//! the registry entries, report the outcome. That teardown runs exactly
//! once.

use std::sync::Arc;
use std::time::Duration;

use stonewire_protocol::UserId;
use stonewire_room::{
    await_event, ChatLine, GameEnd, GameStart, RoomConnection, RoomError,
    WaitError,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::collab::{
    ExternalUser, IdentityStore, Messenger, Profile, RoomDirectory,
};
use crate::registry::{AuthRegistry, MatchRegistry};
use crate::MatchError;

/// How long the join phase waits for both participants to enter.
pub const JOIN_DEADLINE: Duration = Duration::from_secs(60);

/// How long to wait for the room snapshot after connecting.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pairs participants into hosted matches.
///
/// Generic over its collaborators so tests can drop in in-memory
/// implementations. The registries are injected, never ambient, so
/// independent matchmakers do not share state.
pub struct Matchmaker<D, M, I> {
    admin: UserId,
    directory: Arc<D>,
    messenger: Arc<M>,
    identity: Arc<I>,
    matches: Arc<MatchRegistry>,
    auths: Arc<AuthRegistry>,
    join_deadline: Duration,
}

impl<D, M, I> Matchmaker<D, M, I>
where
    D: RoomDirectory,
    M: Messenger,
    I: IdentityStore,
{
    /// `admin` is the game account the matchmaker connects to rooms
    /// as; it becomes the owner of every room it creates.
    pub fn new(
        admin: UserId,
        directory: Arc<D>,
        messenger: Arc<M>,
        identity: Arc<I>,
        matches: Arc<MatchRegistry>,
        auths: Arc<AuthRegistry>,
    ) -> Self {
        Self {
            admin,
            directory,
            messenger,
            identity,
            matches,
            auths,
            join_deadline: JOIN_DEADLINE,
        }
    }

    /// Overrides the join-phase deadline.
    pub fn with_join_deadline(mut self, deadline: Duration) -> Self {
        self.join_deadline = deadline;
        self
    }

    /// Resolves an external user to their game account: identity-store
    /// lookup, then a scan of the directory's account list. `None`
    /// means "not registered", which is a reportable outcome rather
    /// than an error.
    pub async fn resolve_participant(
        &self,
        user: &ExternalUser,
    ) -> Result<Option<Profile>, MatchError> {
        let Some(id) = self.identity.get(user).await? else {
            return Ok(None);
        };
        if !id.is_assigned() {
            return Ok(None);
        }
        let users = self.directory.list_users().await?;
        Ok(users.into_iter().find(|profile| profile.id == id))
    }

    /// Starts a match between `a` (black) and `b` (white).
    ///
    /// Rejects before creating any room if either participant cannot
    /// be resolved, if both seats resolve to the same participant, or
    /// if either is already in a match. On success the returned
    /// handle tracks the driver task, which runs the match to its end
    /// and reports the outcome on the messaging channel.
    pub async fn start_match(
        &self,
        a: &ExternalUser,
        b: &ExternalUser,
    ) -> Result<JoinHandle<()>, MatchError> {
        let (black, white) = match (
            self.resolve_participant(a).await?,
            self.resolve_participant(b).await?,
        ) {
            (Some(black), Some(white)) => (black, white),
            (black, white) => {
                let mut missing = Vec::new();
                if black.is_none() {
                    missing.push(a.nickname.as_str());
                }
                if white.is_none() {
                    missing.push(b.nickname.as_str());
                }
                return Err(MatchError::Unregistered(missing.join(", ")));
            }
        };
        // The same external user, or two users bound to one game
        // account, cannot take both seats.
        if a.key() == b.key() || black.id == white.id {
            return Err(MatchError::SelfMatch(a.nickname.clone()));
        }
        if self.matches.contains(black.id) {
            return Err(MatchError::AlreadyPlaying(a.nickname.clone()));
        }
        if self.matches.contains(white.id) {
            return Err(MatchError::AlreadyPlaying(b.nickname.clone()));
        }

        let name = format!(
            "[{}] {} vs {}",
            self.messenger.name(),
            a.nickname,
            b.nickname
        );
        let hosted = self.directory.create_room(&name).await?;
        let listed = self
            .directory
            .fetch_rooms()
            .await?
            .into_iter()
            .any(|room| room.id == hosted.id);
        if !listed {
            return Err(MatchError::Directory(format!(
                "created room {} is not listed",
                hosted.id
            )));
        }
        self.messenger
            .send(&format!("room: {}", hosted.name))
            .await?;

        let conn =
            Arc::new(RoomConnection::connect(&hosted.server, self.admin).await?);
        if let Err(err) = conn.await_ready(READY_TIMEOUT).await {
            conn.close().await;
            return Err(err.into());
        }

        // Re-checked under the registry lock: a racing request may have
        // won while the room was being set up.
        if let Err(taken) =
            self.matches.register_pair(black.id, white.id, &hosted.id)
        {
            conn.close().await;
            let nickname = if taken == black.id {
                a.nickname.clone()
            } else {
                b.nickname.clone()
            };
            return Err(MatchError::AlreadyPlaying(nickname));
        }

        // Subscribe before handing off so no early event is missed.
        let entered = conn.events().subscribe_entered();
        let chat = conn.events().subscribe_chat();
        let left = conn.events().subscribe_left();
        let started = conn.events().subscribe_started();
        let ended = conn.events().subscribe_ended();

        tracing::info!(
            room = %hosted.id,
            black = %black.id,
            white = %white.id,
            "match created"
        );
        let driver = MatchDriver {
            conn,
            directory: Arc::clone(&self.directory),
            messenger: Arc::clone(&self.messenger),
            matches: Arc::clone(&self.matches),
            black,
            white,
            join_deadline: self.join_deadline,
        };
        Ok(tokio::spawn(driver.run(entered, chat, left, started, ended)))
    }

    // -- identity binding -------------------------------------------------

    /// Opens an authentication attempt for `user`. At most one may be
    /// in flight per user, and an already-bound user is rejected.
    pub async fn begin_auth(
        &self,
        user: &ExternalUser,
    ) -> Result<(), MatchError> {
        let bound = self
            .identity
            .get(user)
            .await?
            .is_some_and(|id| id.is_assigned());
        if bound {
            return Err(MatchError::AlreadyBound(user.nickname.clone()));
        }
        if !self.auths.begin(&user.key()) {
            return Err(MatchError::AuthPending(user.nickname.clone()));
        }
        Ok(())
    }

    /// Binds a verified game id to `user` and clears the pending
    /// authentication.
    pub async fn complete_auth(
        &self,
        user: &ExternalUser,
        id: UserId,
    ) -> Result<(), MatchError> {
        self.identity.set(user, id).await?;
        self.auths.finish(&user.key());
        tracing::info!(key = %user.key(), %id, "identity bound");
        self.messenger
            .send(&format!(
                "{} login complete (ID:{id})",
                self.messenger.mention(user)
            ))
            .await
    }

    /// Abandons a pending authentication (timeout or user request).
    pub fn cancel_auth(&self, user: &ExternalUser) {
        self.auths.finish(&user.key());
    }

    /// Removes the game-id binding for `user`.
    pub async fn unbind_identity(
        &self,
        user: &ExternalUser,
    ) -> Result<(), MatchError> {
        match self.identity.get(user).await? {
            Some(id) if id.is_assigned() => {
                self.identity.set(user, UserId::UNASSIGNED).await?;
                self.messenger
                    .send(&format!(
                        "{} unbound.",
                        self.messenger.mention(user)
                    ))
                    .await
            }
            _ => Err(MatchError::Unregistered(user.nickname.clone())),
        }
    }
}

/// How one match ended.
enum Outcome {
    /// A participant did not join within the deadline.
    Abandoned,
    /// The game ran to a verdict.
    Finished {
        winner: Profile,
        color: &'static str,
    },
    /// The room connection dropped mid-match.
    ConnectionLost,
}

/// Owns one match from join phase to teardown.
struct MatchDriver<D, M> {
    conn: Arc<RoomConnection>,
    directory: Arc<D>,
    messenger: Arc<M>,
    matches: Arc<MatchRegistry>,
    black: Profile,
    white: Profile,
    join_deadline: Duration,
}

impl<D, M> MatchDriver<D, M>
where
    D: RoomDirectory,
    M: Messenger,
{
    async fn run(
        self,
        mut entered: broadcast::Receiver<UserId>,
        mut chat: broadcast::Receiver<ChatLine>,
        mut left: broadcast::Receiver<UserId>,
        mut started: broadcast::Receiver<GameStart>,
        mut ended: broadcast::Receiver<GameEnd>,
    ) {
        let outcome = self
            .drive(&mut entered, &mut chat, &mut left, &mut started, &mut ended)
            .await;

        // The single teardown point for every exit path.
        self.conn.close().await;
        self.matches.release_pair(self.black.id, self.white.id);

        let report = match &outcome {
            Ok(Outcome::Finished { winner, color }) => {
                format!("{} ({color}) wins!", winner.username)
            }
            Ok(Outcome::Abandoned) => {
                "the room was closed because a player did not join in time."
                    .to_owned()
            }
            Ok(Outcome::ConnectionLost) => {
                "the room connection was lost.".to_owned()
            }
            Err(err) => format!("the match was aborted: {err}"),
        };
        if let Err(err) = self.messenger.send(&report).await {
            tracing::error!(error = %err, "failed to report match outcome");
        }
    }

    async fn drive(
        &self,
        entered: &mut broadcast::Receiver<UserId>,
        chat: &mut broadcast::Receiver<ChatLine>,
        left: &mut broadcast::Receiver<UserId>,
        started: &mut broadcast::Receiver<GameStart>,
        ended: &mut broadcast::Receiver<GameEnd>,
    ) -> Result<Outcome, MatchError> {
        // Join phase: seat each participant as they enter; once both
        // seats are filled, request the start and move on.
        let joined = await_event(entered, self.join_deadline, true, move |user| {
            async move {
                self.seat_participant(user).await?;
                let conf = self.conn.room().await.conf;
                if conf.black.is_assigned() && conf.white.is_assigned() {
                    match self.conn.start_game().await {
                        Ok(()) => {
                            self.conn.send_chat("the game begins.").await?;
                            return Ok(Some(()));
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "start request rejected");
                        }
                    }
                }
                Ok::<Option<()>, MatchError>(None)
            }
        })
        .await;

        match joined {
            Ok(Some(())) => {}
            Ok(None) | Err(WaitError::Timeout(_)) => {
                return Ok(Outcome::Abandoned);
            }
            Err(WaitError::Closed) => return Ok(Outcome::ConnectionLost),
            Err(WaitError::Eval(err)) => return Err(err),
        }

        // In-progress phase: relay chat and disconnect notices until a
        // verdict arrives or the connection drops.
        loop {
            tokio::select! {
                line = chat.recv() => match line {
                    Ok(line) => self.relay_chat(line).await?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "chat relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Ok(Outcome::ConnectionLost);
                    }
                },
                user = left.recv() => match user {
                    Ok(user) => self.relay_leave(user).await?,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        return Ok(Outcome::ConnectionLost);
                    }
                },
                start = started.recv() => match start {
                    Ok(_) => self.messenger.send("game started.").await?,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        return Ok(Outcome::ConnectionLost);
                    }
                },
                end = ended.recv() => match end {
                    Ok(end) => return self.finish(end).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        return Ok(Outcome::ConnectionLost);
                    }
                },
            }
        }
    }

    /// Seats an entering participant on their reserved color. An
    /// unconfirmed conf change is reported but keeps the join phase
    /// alive; the next enter retries.
    async fn seat_participant(&self, user: UserId) -> Result<(), MatchError> {
        let conf = self.conn.room().await.conf;
        let (profile, color) = if user == self.black.id {
            if conf.black == self.black.id {
                return Ok(());
            }
            (&self.black, "black")
        } else if user == self.white.id {
            if conf.white == self.white.id {
                return Ok(());
            }
            (&self.white, "white")
        } else {
            return Ok(());
        };

        let seated = if color == "black" {
            self.conn.set_black(profile.id).await
        } else {
            self.conn.set_white(profile.id).await
        };
        match seated {
            Ok(()) => {
                self.conn
                    .send_chat(format!(
                        "{color} player {} has entered.",
                        profile.username
                    ))
                    .await?;
                Ok(())
            }
            Err(err @ RoomError::ConfUnconfirmed(_)) => {
                tracing::warn!(error = %err, %color, "failed to seat player");
                self.messenger
                    .send(&format!("failed to seat the {color} player."))
                    .await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn relay_chat(&self, line: ChatLine) -> Result<(), MatchError> {
        let name = match self.directory.user(line.user).await {
            Ok(profile) => profile.username,
            Err(err) => {
                tracing::debug!(error = %err, user = %line.user, "chat from unknown account");
                line.user.to_string()
            }
        };
        self.messenger
            .send(&format!("{name} : {}", line.content))
            .await
    }

    /// A leave during the game is informational only; the game service
    /// owns forfeiture.
    async fn relay_leave(&self, user: UserId) -> Result<(), MatchError> {
        if !self.conn.room().await.ingame {
            return Ok(());
        }
        let name = if user == self.black.id {
            Some(self.black.username.as_str())
        } else if user == self.white.id {
            Some(self.white.username.as_str())
        } else {
            None
        };
        if let Some(name) = name {
            self.conn
                .send_chat(format!("player {name} has left the room."))
                .await?;
        }
        Ok(())
    }

    /// Maps the reported loser onto the recorded seats to name the
    /// winner.
    async fn finish(&self, end: GameEnd) -> Result<Outcome, MatchError> {
        let conf = self.conn.room().await.conf;
        let (winner_id, color) = if end.loser == conf.black {
            (conf.white, "white")
        } else {
            (conf.black, "black")
        };
        let winner = self.directory.user(winner_id).await?;
        tracing::info!(winner = %winner_id, color, "match finished");
        Ok(Outcome::Finished { winner, color })
    }
}
