//! Connection lifecycle and live room state.

use stonewire_protocol::{
    Board, RoomConf, RoomSnapshot, Turn, UserId,
};

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle of one room connection.
///
/// ```text
/// Disconnected → Connecting → Connected → Closed
/// ```
///
/// `Connected` is the only state in which commands may be sent. A
/// connection that drops before reaching `Connected` falls back to
/// `Disconnected`; one that drops afterwards ends in `Closed`. Both are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl ConnectionState {
    /// Returns `true` if commands may be sent.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the connection will never become usable again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The live state of the room this connection is joined to.
///
/// Owned by the connection; mutated only by the reader task as events
/// arrive. Readers get a clone, so nothing they do can leak back in.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    /// Server-assigned room id. Empty until the snapshot arrives.
    pub id: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Current room configuration.
    pub conf: RoomConf,
    /// Participants currently in the room.
    pub users: Vec<UserId>,
    /// Whether a game is in progress.
    pub ingame: bool,
    /// Whose turn it is, once a game has started.
    pub turn: Option<Turn>,
    /// The board grid, once a game has started.
    pub board: Board,
    /// Ordered chat log.
    pub messages: Vec<String>,
}

impl RoomState {
    /// Replaces the room identity and configuration from the `connect`
    /// snapshot.
    pub(crate) fn apply_snapshot(&mut self, snapshot: &RoomSnapshot) {
        self.id = snapshot.id.clone();
        self.created_at = snapshot.created_at;
        self.conf = snapshot.conf.clone();
        self.users = snapshot.users.clone();
        self.ingame = snapshot.ingame;
    }

    /// Adds a participant. Entering an already-present id is a no-op.
    pub(crate) fn add_user(&mut self, user: UserId) {
        if !self.users.contains(&user) {
            self.users.push(user);
        }
    }

    /// Removes a participant. Leaving an absent id is a no-op.
    pub(crate) fn remove_user(&mut self, user: UserId) {
        self.users.retain(|u| *u != user);
    }

    /// Applies a game start: seats, turn, board, and the ingame flag.
    pub(crate) fn apply_start(
        &mut self,
        black: UserId,
        white: UserId,
        turn: Turn,
        board: Board,
    ) {
        self.conf.black = black;
        self.conf.white = white;
        self.turn = Some(turn);
        self.board = board;
        self.ingame = true;
    }

    /// Returns `true` if `user` holds the black or the white seat.
    pub fn is_seated(&self, user: UserId) -> bool {
        user.is_assigned()
            && (self.conf.black == user || self.conf.white == user)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Closed.is_connected());
    }

    #[test]
    fn test_connection_state_is_terminal() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
    }

    #[test]
    fn test_add_user_is_idempotent() {
        let mut state = RoomState::default();
        state.add_user(UserId(1));
        state.add_user(UserId(1));
        assert_eq!(state.users, vec![UserId(1)]);
    }

    #[test]
    fn test_remove_user_absent_is_noop() {
        let mut state = RoomState::default();
        state.add_user(UserId(1));
        state.remove_user(UserId(9));
        assert_eq!(state.users, vec![UserId(1)]);

        state.remove_user(UserId(1));
        assert!(state.users.is_empty());
    }

    #[test]
    fn test_apply_start_sets_seats_and_ingame() {
        let mut state = RoomState::default();
        state.apply_start(
            UserId(1),
            UserId(2),
            Turn::White,
            vec![vec![".".into()]],
        );
        assert_eq!(state.conf.black, UserId(1));
        assert_eq!(state.conf.white, UserId(2));
        assert_eq!(state.turn, Some(Turn::White));
        assert!(state.ingame);
    }

    #[test]
    fn test_is_seated() {
        let mut state = RoomState::default();
        assert!(!state.is_seated(UserId::UNASSIGNED));

        state.conf.black = UserId(1);
        assert!(state.is_seated(UserId(1)));
        assert!(!state.is_seated(UserId(2)));
    }
}
