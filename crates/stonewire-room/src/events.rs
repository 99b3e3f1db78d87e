//! Typed event fan-out for one room connection.
//!
//! Each event kind gets its own `tokio::sync::broadcast` channel, so a
//! caller subscribes to exactly the kinds it cares about and unsubscribes
//! by dropping the receiver. When the connection shuts down, every
//! sender is dropped: in-flight receivers observe `Closed` instead of
//! hanging, and late subscribers get a receiver that is already closed.

use std::sync::Mutex;

use stonewire_protocol::{
    Board, RoomConf, RoomSnapshot, Turn, UserId,
};
use tokio::sync::broadcast;

/// Buffered events per subscriber before a slow one starts lagging.
const EVENT_CAPACITY: usize = 64;

/// A chat line received from the room.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub user: UserId,
    pub content: String,
}

/// Payload of the "started" notification.
#[derive(Debug, Clone, PartialEq)]
pub struct GameStart {
    pub black: UserId,
    pub white: UserId,
    pub turn: Turn,
    pub board: Board,
}

/// Payload of the "ended" notification.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEnd {
    pub loser: UserId,
    pub cause: Option<String>,
}

struct Senders {
    connected: broadcast::Sender<RoomSnapshot>,
    conf: broadcast::Sender<RoomConf>,
    entered: broadcast::Sender<UserId>,
    left: broadcast::Sender<UserId>,
    chat: broadcast::Sender<ChatLine>,
    started: broadcast::Sender<GameStart>,
    ended: broadcast::Sender<GameEnd>,
    game_error: broadcast::Sender<String>,
    closed: broadcast::Sender<()>,
}

/// The subscription point of a [`RoomConnection`](crate::RoomConnection).
///
/// One broadcast channel per event kind. All `subscribe_*` methods are
/// valid in any connection state; after shutdown they return receivers
/// that immediately report closed.
pub struct RoomEvents {
    senders: Mutex<Option<Senders>>,
}

impl RoomEvents {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(Some(Senders {
                connected: broadcast::channel(EVENT_CAPACITY).0,
                conf: broadcast::channel(EVENT_CAPACITY).0,
                entered: broadcast::channel(EVENT_CAPACITY).0,
                left: broadcast::channel(EVENT_CAPACITY).0,
                chat: broadcast::channel(EVENT_CAPACITY).0,
                started: broadcast::channel(EVENT_CAPACITY).0,
                ended: broadcast::channel(EVENT_CAPACITY).0,
                game_error: broadcast::channel(EVENT_CAPACITY).0,
                closed: broadcast::channel(1).0,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&Senders) -> R) -> Option<R> {
        let guard = self.senders.lock().expect("event senders poisoned");
        guard.as_ref().map(f)
    }

    /// Subscribes to a kind, or returns an already-closed receiver if
    /// the connection has shut down.
    fn subscribe<T: Clone>(
        &self,
        pick: impl FnOnce(&Senders) -> &broadcast::Sender<T>,
    ) -> broadcast::Receiver<T> {
        match self.with(|s| pick(s).subscribe()) {
            Some(rx) => rx,
            None => closed_receiver(),
        }
    }

    /// "connected": the initial room snapshot arrived.
    pub fn subscribe_connected(&self) -> broadcast::Receiver<RoomSnapshot> {
        self.subscribe(|s| &s.connected)
    }

    /// "conf changed": the full new configuration.
    pub fn subscribe_conf(&self) -> broadcast::Receiver<RoomConf> {
        self.subscribe(|s| &s.conf)
    }

    /// "entered": a participant joined.
    pub fn subscribe_entered(&self) -> broadcast::Receiver<UserId> {
        self.subscribe(|s| &s.entered)
    }

    /// "left": a participant departed.
    pub fn subscribe_left(&self) -> broadcast::Receiver<UserId> {
        self.subscribe(|s| &s.left)
    }

    /// "chat": a chat line arrived.
    pub fn subscribe_chat(&self) -> broadcast::Receiver<ChatLine> {
        self.subscribe(|s| &s.chat)
    }

    /// "started": the game began.
    pub fn subscribe_started(&self) -> broadcast::Receiver<GameStart> {
        self.subscribe(|s| &s.started)
    }

    /// "ended": the game finished.
    pub fn subscribe_ended(&self) -> broadcast::Receiver<GameEnd> {
        self.subscribe(|s| &s.ended)
    }

    /// "game error": the server reported a problem; the connection
    /// stays open.
    pub fn subscribe_game_error(&self) -> broadcast::Receiver<String> {
        self.subscribe(|s| &s.game_error)
    }

    /// "closed": the terminal notification, fired exactly once.
    pub fn subscribe_closed(&self) -> broadcast::Receiver<()> {
        self.subscribe(|s| &s.closed)
    }

    // -- firing (reader task only) ----------------------------------------

    pub(crate) fn fire_connected(&self, snapshot: RoomSnapshot) {
        self.with(|s| drop(s.connected.send(snapshot)));
    }

    pub(crate) fn fire_conf(&self, conf: RoomConf) {
        self.with(|s| drop(s.conf.send(conf)));
    }

    pub(crate) fn fire_entered(&self, user: UserId) {
        self.with(|s| drop(s.entered.send(user)));
    }

    pub(crate) fn fire_left(&self, user: UserId) {
        self.with(|s| drop(s.left.send(user)));
    }

    pub(crate) fn fire_chat(&self, line: ChatLine) {
        self.with(|s| drop(s.chat.send(line)));
    }

    pub(crate) fn fire_started(&self, start: GameStart) {
        self.with(|s| drop(s.started.send(start)));
    }

    pub(crate) fn fire_ended(&self, end: GameEnd) {
        self.with(|s| drop(s.ended.send(end)));
    }

    pub(crate) fn fire_game_error(&self, msg: String) {
        self.with(|s| drop(s.game_error.send(msg)));
    }

    /// Fires the terminal "closed" notification and drops every sender.
    /// Idempotent: the second call finds nothing to drop.
    pub(crate) fn shutdown(&self) {
        let taken = {
            let mut guard =
                self.senders.lock().expect("event senders poisoned");
            guard.take()
        };
        if let Some(senders) = taken {
            let _ = senders.closed.send(());
            // Senders drop here; every receiver now reports Closed.
        }
    }
}

/// A receiver whose channel is already closed.
fn closed_receiver<T: Clone>() -> broadcast::Receiver<T> {
    let (tx, rx) = broadcast::channel(1);
    drop(tx);
    rx
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[tokio::test]
    async fn test_subscribe_then_fire_delivers_event() {
        let events = RoomEvents::new();
        let mut rx = events.subscribe_entered();

        events.fire_entered(UserId(4));

        assert_eq!(rx.recv().await.unwrap(), UserId(4));
    }

    #[tokio::test]
    async fn test_fire_without_subscribers_is_not_an_error() {
        let events = RoomEvents::new();
        events.fire_entered(UserId(4));
        events.fire_game_error("nobody listening".into());
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_receiving() {
        let events = RoomEvents::new();
        let rx = events.subscribe_chat();
        drop(rx);

        // A fresh subscriber only sees events fired after it subscribed.
        events.fire_chat(ChatLine {
            user: UserId(1),
            content: "early".into(),
        });
        let mut rx = events.subscribe_chat();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_shutdown_fires_closed_once() {
        let events = RoomEvents::new();
        let mut closed = events.subscribe_closed();

        events.shutdown();
        events.shutdown();

        assert!(closed.recv().await.is_ok());
        // Exactly one closed notification, then the channel ends.
        assert!(matches!(closed.recv().await, Err(RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_inflight_subscriptions() {
        let events = RoomEvents::new();
        let mut rx = events.subscribe_entered();

        events.shutdown();

        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_reports_closed() {
        let events = RoomEvents::new();
        events.shutdown();

        let mut rx = events.subscribe_conf();
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_fire_after_shutdown_is_a_noop() {
        let events = RoomEvents::new();
        events.shutdown();
        events.fire_entered(UserId(1));
    }
}
