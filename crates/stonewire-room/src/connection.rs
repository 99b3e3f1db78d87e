//! The room connection: one TCP stream, one reader task, typed commands.
//!
//! All room state mutation happens on the reader task as events arrive,
//! so state needs no locking discipline beyond the mutex that hands out
//! snapshots. Commands run preconditions against the current state and
//! only then touch the wire.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use stonewire_protocol::{
    encode_command, ClientCommand, ConfPatch, FrameReader, RoomServerInfo,
    ServerEvent, UserId,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::events::{ChatLine, GameEnd, GameStart, RoomEvents};
use crate::state::{ConnectionState, RoomState};
use crate::wait::{await_event, WaitError};
use crate::RoomError;

/// How long a conf mutation waits for the server's confirming broadcast.
pub const CONF_ACK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Read buffer size for the inbound stream.
const READ_BUF: usize = 4096;

struct Inner {
    state: ConnectionState,
    room: RoomState,
}

/// A live connection to one hosted room.
///
/// Created with [`connect`](Self::connect); torn down with
/// [`close`](Self::close) or by the server dropping the stream. Wrap in
/// an [`Arc`] to share across tasks.
pub struct RoomConnection {
    me: UserId,
    inner: Arc<Mutex<Inner>>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    events: Arc<RoomEvents>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

// Manual impl: the live state sits behind async locks, so only the
// identity field is printable without blocking.
impl std::fmt::Debug for RoomConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomConnection")
            .field("me", &self.me)
            .finish_non_exhaustive()
    }
}

impl RoomConnection {
    /// Opens the stream to `server`, sends the `connect` command with
    /// the invite token, and starts the reader task.
    ///
    /// Returns as soon as the stream is open and the command is on the
    /// wire; the room snapshot arrives asynchronously. Use
    /// [`await_ready`](Self::await_ready) to block until it has.
    pub async fn connect(
        server: &RoomServerInfo,
        me: UserId,
    ) -> Result<Self, RoomError> {
        tracing::debug!(addr = %server.addr, %me, "connecting to room server");
        let stream = TcpStream::connect(&server.addr)
            .await
            .map_err(RoomError::Connect)?;
        let (read_half, write_half) = stream.into_split();

        let inner = Arc::new(Mutex::new(Inner {
            state: ConnectionState::Connecting,
            room: RoomState::default(),
        }));
        let writer = Arc::new(Mutex::new(Some(write_half)));
        let events = Arc::new(RoomEvents::new());

        let connection = Self {
            me,
            inner: Arc::clone(&inner),
            writer: Arc::clone(&writer),
            events: Arc::clone(&events),
            reader: Mutex::new(None),
        };

        connection
            .send_command(&ClientCommand::Connect {
                invite: server.invite.clone(),
            })
            .await?;
        connection.inner.lock().await.state = ConnectionState::Connected;

        let handle = tokio::spawn(run_reader(read_half, inner, writer, events));
        *connection.reader.lock().await = Some(handle);

        Ok(connection)
    }

    /// The participant this connection authenticates as.
    pub fn me(&self) -> UserId {
        self.me
    }

    /// The subscription point for this connection's events.
    pub fn events(&self) -> &RoomEvents {
        &self.events
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// An owned copy of the live room state. Mutating the copy never
    /// affects the connection.
    pub async fn room(&self) -> RoomState {
        self.inner.lock().await.room.clone()
    }

    /// Waits until the initial room snapshot has been applied, then
    /// returns the room state.
    pub async fn await_ready(
        &self,
        timeout: Duration,
    ) -> Result<RoomState, RoomError> {
        // Subscribe before checking, so a snapshot landing in between
        // is caught by the receiver rather than missed.
        let mut rx = self.events.subscribe_connected();
        {
            let inner = self.inner.lock().await;
            if !inner.room.id.is_empty() {
                return Ok(inner.room.clone());
            }
        }
        match await_event(&mut rx, timeout, true, |_| async {
            Ok::<_, Infallible>(Some(()))
        })
        .await
        {
            Ok(_) => Ok(self.inner.lock().await.room.clone()),
            Err(WaitError::Timeout(d)) => Err(RoomError::NoSnapshot(d)),
            Err(WaitError::Closed) => Err(RoomError::Closed),
            Err(WaitError::Eval(e)) => match e {},
        }
    }

    // -- commands ---------------------------------------------------------

    /// Sends a chat line.
    pub async fn send_chat(
        &self,
        content: impl Into<String>,
    ) -> Result<(), RoomError> {
        self.ensure_connected().await?;
        self.send_command(&ClientCommand::Chat {
            content: content.into(),
        })
        .await
    }

    /// Renames the room.
    pub async fn set_name(
        &self,
        name: impl Into<String>,
    ) -> Result<(), RoomError> {
        self.set_config(&ConfPatch::name(name)).await
    }

    /// Seats `user` as black.
    pub async fn set_black(&self, user: UserId) -> Result<(), RoomError> {
        self.set_config(&ConfPatch::black(user)).await
    }

    /// Seats `user` as white.
    pub async fn set_white(&self, user: UserId) -> Result<(), RoomError> {
        self.set_config(&ConfPatch::white(user)).await
    }

    /// Hands room ownership to `user`.
    ///
    /// Transferring to oneself while already owner is a no-op success:
    /// nothing needs to change, so nothing is sent.
    pub async fn set_owner(&self, user: UserId) -> Result<(), RoomError> {
        {
            let inner = self.inner.lock().await;
            if inner.room.conf.king == self.me && user == self.me {
                return Ok(());
            }
        }
        self.set_config(&ConfPatch::king(user)).await
    }

    /// Applies a configuration patch and waits for the server to
    /// confirm it.
    ///
    /// The wire command always carries the full merged conf, never a
    /// diff. Confirmation means a `conf` broadcast matching the merged
    /// conf on every field arrives within [`CONF_ACK_TIMEOUT`];
    /// non-matching broadcasts keep the wait alive. On timeout the
    /// command was still sent and no rollback is attempted.
    pub async fn set_config(
        &self,
        patch: &ConfPatch,
    ) -> Result<(), RoomError> {
        let merged = {
            let inner = self.inner.lock().await;
            if !inner.state.is_connected() {
                return Err(RoomError::NotConnected);
            }
            if inner.room.conf.king != self.me {
                return Err(RoomError::NotOwner);
            }
            if inner.room.ingame {
                return Err(RoomError::InGame);
            }
            inner.room.conf.merged(patch)
        };

        // Subscribe before sending so the echo cannot slip past.
        let mut confirm = self.events.subscribe_conf();
        self.send_command(&ClientCommand::Conf {
            conf: merged.clone(),
        })
        .await?;

        match await_event(&mut confirm, CONF_ACK_TIMEOUT, true, |conf| {
            let confirmed = merged.matches(&conf);
            async move { Ok::<_, Infallible>(confirmed.then_some(())) }
        })
        .await
        {
            Ok(Some(())) => Ok(()),
            Ok(None) => Err(RoomError::ConfUnconfirmed(CONF_ACK_TIMEOUT)),
            Err(WaitError::Timeout(d)) => Err(RoomError::ConfUnconfirmed(d)),
            Err(WaitError::Closed) => Err(RoomError::Closed),
            Err(WaitError::Eval(e)) => match e {},
        }
    }

    /// Starts the game. Owner-only; both seats must be assigned and no
    /// game may be in progress.
    pub async fn start_game(&self) -> Result<(), RoomError> {
        {
            let inner = self.inner.lock().await;
            if !inner.state.is_connected() {
                return Err(RoomError::NotConnected);
            }
            if inner.room.conf.king != self.me {
                return Err(RoomError::NotOwner);
            }
            if inner.room.ingame {
                return Err(RoomError::InGame);
            }
            if !inner.room.conf.black.is_assigned()
                || !inner.room.conf.white.is_assigned()
            {
                return Err(RoomError::SeatsUnfilled);
            }
        }
        self.send_command(&ClientCommand::Start).await
    }

    /// Forfeits the game in progress. The caller must hold a seat.
    pub async fn give_up(&self) -> Result<(), RoomError> {
        {
            let inner = self.inner.lock().await;
            if !inner.state.is_connected() {
                return Err(RoomError::NotConnected);
            }
            if !inner.room.ingame {
                return Err(RoomError::NotInGame);
            }
            if !inner.room.is_seated(self.me) {
                return Err(RoomError::NotSeated);
            }
        }
        self.send_command(&ClientCommand::Gg).await
    }

    /// Forcibly tears the connection down. Idempotent and safe to call
    /// from any state; in-flight waits observe the closure rather than
    /// hanging.
    pub async fn close(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.state = match inner.state {
                ConnectionState::Connected | ConnectionState::Closed => {
                    ConnectionState::Closed
                }
                _ => ConnectionState::Disconnected,
            };
        }
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        *self.writer.lock().await = None;
        self.events.shutdown();
        tracing::debug!(me = %self.me, "room connection closed");
    }

    // -- internals --------------------------------------------------------

    async fn ensure_connected(&self) -> Result<(), RoomError> {
        if self.inner.lock().await.state.is_connected() {
            Ok(())
        } else {
            Err(RoomError::NotConnected)
        }
    }

    async fn send_command(
        &self,
        command: &ClientCommand,
    ) -> Result<(), RoomError> {
        let bytes = encode_command(command)?;
        let mut writer = self.writer.lock().await;
        let Some(w) = writer.as_mut() else {
            return Err(RoomError::Closed);
        };
        w.write_all(&bytes).await.map_err(RoomError::Send)?;
        w.flush().await.map_err(RoomError::Send)
    }

    #[cfg(test)]
    fn stub(me: UserId, state: ConnectionState, room: RoomState) -> Self {
        Self {
            me,
            inner: Arc::new(Mutex::new(Inner { state, room })),
            writer: Arc::new(Mutex::new(None)),
            events: Arc::new(RoomEvents::new()),
            reader: Mutex::new(None),
        }
    }
}

/// Reader task: drains the stream, applies events, fires notifications.
/// Runs until EOF, a read error, or abort via [`RoomConnection::close`].
async fn run_reader(
    mut read_half: OwnedReadHalf,
    inner: Arc<Mutex<Inner>>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    events: Arc<RoomEvents>,
) {
    let mut frames = FrameReader::new();
    let mut buf = [0u8; READ_BUF];

    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("room server closed the stream");
                break;
            }
            Ok(n) => {
                frames.extend(&buf[..n]);
                while let Some(item) = frames.next_event() {
                    match item {
                        Ok(event) => {
                            apply_event(&inner, &events, event).await;
                        }
                        Err(err) => {
                            // Frame-local: discard and keep reading.
                            tracing::warn!(
                                error = %err,
                                "discarding malformed frame"
                            );
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "room stream read failed");
                break;
            }
        }
    }

    // Terminal transition, exactly once across all paths.
    {
        let mut guard = inner.lock().await;
        guard.state = match guard.state {
            ConnectionState::Connected | ConnectionState::Closed => {
                ConnectionState::Closed
            }
            _ => ConnectionState::Disconnected,
        };
    }
    *writer.lock().await = None;
    events.shutdown();
}

/// Applies one inbound event to room state and fires the matching
/// notification. The only place room state mutates.
async fn apply_event(
    inner: &Mutex<Inner>,
    events: &RoomEvents,
    event: ServerEvent,
) {
    match event {
        ServerEvent::Connect { room } => {
            {
                let mut guard = inner.lock().await;
                guard.room.apply_snapshot(&room);
            }
            tracing::info!(room_id = %room.id, "joined room");
            events.fire_connected(room);
        }
        ServerEvent::Conf { conf } => {
            {
                let mut guard = inner.lock().await;
                guard.room.conf = conf.clone();
            }
            events.fire_conf(conf);
        }
        ServerEvent::Enter { user } => {
            {
                let mut guard = inner.lock().await;
                guard.room.add_user(user);
            }
            tracing::debug!(%user, "participant entered");
            events.fire_entered(user);
        }
        ServerEvent::Leave { user } => {
            {
                let mut guard = inner.lock().await;
                guard.room.remove_user(user);
            }
            tracing::debug!(%user, "participant left");
            events.fire_left(user);
        }
        ServerEvent::Chat { user, content } => {
            {
                let mut guard = inner.lock().await;
                guard.room.messages.push(content.clone());
            }
            events.fire_chat(ChatLine { user, content });
        }
        ServerEvent::Start {
            black,
            white,
            turn,
            board,
        } => {
            {
                let mut guard = inner.lock().await;
                guard.room.apply_start(black, white, turn, board.clone());
            }
            tracing::info!(%black, %white, "game started");
            events.fire_started(GameStart {
                black,
                white,
                turn,
                board,
            });
        }
        ServerEvent::Move => {
            // Reserved by the service; deliberately not replicated.
            tracing::debug!("move event ignored");
        }
        ServerEvent::End { loser, cause } => {
            tracing::info!(%loser, "game ended");
            events.fire_ended(GameEnd { loser, cause });
        }
        ServerEvent::Error { msg } => {
            tracing::error!(%msg, "server reported an error");
            events.fire_game_error(msg);
        }
        ServerEvent::Unknown => {
            tracing::debug!("unknown event kind ignored");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
