//! Core wire types: room events, client commands, and room configuration.
//!
//! Every record on the wire is a JSON object carrying a `"type"` field;
//! the enums here use `#[serde(tag = "type")]` with lowercase tags so
//! that the derived implementations produce exactly that shape.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A participant id as issued by the game service.
///
/// A newtype rather than a bare `i64` so a user id cannot be confused
/// with timestamps or counters at call sites; `#[serde(transparent)]`
/// keeps the wire shape a plain JSON number, exactly as the service
/// sends it. The service uses `-1` as the "unassigned" sentinel for
/// seats and ownership, so the inner type is signed and
/// [`UserId::UNASSIGNED`] is the canonical sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// The sentinel for an empty seat or unclaimed ownership.
    pub const UNASSIGNED: UserId = UserId(-1);

    /// Returns `true` if this id refers to an actual participant.
    pub fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room configuration
// ---------------------------------------------------------------------------

/// Rule parameters for a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRule {
    /// Seconds a player may spend on a single turn.
    pub turn_timeout: u32,
    /// Seconds the whole game may last.
    pub game_timeout: u32,
    /// Number of stones a player must lose to be defeated.
    pub defeat_lost_stones: u32,
}

impl Default for GameRule {
    fn default() -> Self {
        Self {
            turn_timeout: 60,
            game_timeout: 1800,
            defeat_lost_stones: 6,
        }
    }
}

/// The mutable configuration of a room: its name, seats, owner, rules,
/// and initial board layout.
///
/// Only the participant equal to `king` may request mutations, and the
/// server rejects mutations once the game has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConf {
    /// Display name of the room.
    pub name: String,
    /// The participant seated as black, or [`UserId::UNASSIGNED`].
    pub black: UserId,
    /// The participant seated as white, or [`UserId::UNASSIGNED`].
    pub white: UserId,
    /// The room owner. Conf mutations and game start are owner-only.
    pub king: UserId,
    /// Rule parameters for the match.
    pub rule: GameRule,
    /// Identifier of the initial board layout.
    pub map: String,
}

impl RoomConf {
    /// Creates a conf with empty seats, the given owner, and default rules.
    pub fn new(name: impl Into<String>, king: UserId) -> Self {
        Self {
            name: name.into(),
            black: UserId::UNASSIGNED,
            white: UserId::UNASSIGNED,
            king,
            rule: GameRule::default(),
            map: String::new(),
        }
    }

    /// Checks the seat invariant: black and white must differ unless
    /// both are unassigned.
    pub fn validate(&self) -> bool {
        self.black != self.white
            || (!self.black.is_assigned() && !self.white.is_assigned())
    }

    /// Returns this conf with the patch applied on top. Fields present
    /// in the patch override; everything else is retained.
    pub fn merged(&self, patch: &ConfPatch) -> RoomConf {
        RoomConf {
            name: patch.name.clone().unwrap_or_else(|| self.name.clone()),
            black: patch.black.unwrap_or(self.black),
            white: patch.white.unwrap_or(self.white),
            king: patch.king.unwrap_or(self.king),
            rule: patch.rule.clone().unwrap_or_else(|| self.rule.clone()),
            map: patch.map.clone().unwrap_or_else(|| self.map.clone()),
        }
    }

    /// Compares every field carried by a broadcast conf against `self`.
    ///
    /// The wire conf is fully populated, so this walks each field in
    /// turn; a single mismatch means the broadcast does not confirm the
    /// conf we asked for.
    pub fn matches(&self, broadcast: &RoomConf) -> bool {
        self.name == broadcast.name
            && self.black == broadcast.black
            && self.white == broadcast.white
            && self.king == broadcast.king
            && self.rule == broadcast.rule
            && self.map == broadcast.map
    }
}

impl Default for RoomConf {
    /// An unnamed room with empty seats and no owner.
    fn default() -> Self {
        Self::new("", UserId::UNASSIGNED)
    }
}

/// A partial conf mutation. `None` fields are left untouched by
/// [`RoomConf::merged`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfPatch {
    pub name: Option<String>,
    pub black: Option<UserId>,
    pub white: Option<UserId>,
    pub king: Option<UserId>,
    pub rule: Option<GameRule>,
    pub map: Option<String>,
}

impl ConfPatch {
    /// A patch that seats `user` as black.
    pub fn black(user: UserId) -> Self {
        Self {
            black: Some(user),
            ..Self::default()
        }
    }

    /// A patch that seats `user` as white.
    pub fn white(user: UserId) -> Self {
        Self {
            white: Some(user),
            ..Self::default()
        }
    }

    /// A patch that hands ownership to `user`.
    pub fn king(user: UserId) -> Self {
        Self {
            king: Some(user),
            ..Self::default()
        }
    }

    /// A patch that renames the room.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Board and turn
// ---------------------------------------------------------------------------

/// The board as a 2-D grid of cell values, exactly as the server sends it.
pub type Board = Vec<Vec<String>>;

/// Which color holds the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    Black,
    White,
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Turn::Black => write!(f, "black"),
            Turn::White => write!(f, "white"),
        }
    }
}

// ---------------------------------------------------------------------------
// Room snapshot and server info
// ---------------------------------------------------------------------------

/// The full room snapshot carried by the `connect` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Server-assigned room id.
    pub id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Current room configuration.
    pub conf: RoomConf,
    /// Participants currently in the room.
    pub users: Vec<UserId>,
    /// Whether a game is in progress.
    pub ingame: bool,
}

/// Where to reach a hosted room: the server address and the invite token
/// presented in the `connect` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomServerInfo {
    /// `host:port` of the room server.
    pub addr: String,
    /// One-shot invite token for this room.
    pub invite: String,
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// The closed set of inbound event records.
///
/// The `#[serde(tag = "type")]` attribute selects serde's internally
/// tagged representation: each record is one JSON object whose `"type"`
/// field names the variant and whose remaining fields are the variant's
/// payload, which is exactly the shape the service emits.
///
/// `move` is reserved by the service and deliberately carries no payload
/// here; receiving one must never fail, so the variant accepts and
/// ignores whatever fields the server attaches. Records with a tag
/// outside this set decode to [`ServerEvent::Unknown`] and are dropped
/// by the connection after logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Initial room snapshot, sent once after a successful `connect`.
    Connect { room: RoomSnapshot },
    /// The room configuration changed; carries the full new conf.
    Conf { conf: RoomConf },
    /// A participant joined the room.
    Enter { user: UserId },
    /// A participant left the room.
    Leave { user: UserId },
    /// A chat line from a participant.
    Chat { user: UserId, content: String },
    /// The game started.
    Start {
        black: UserId,
        white: UserId,
        turn: Turn,
        board: Board,
    },
    /// Reserved: a stone move. Currently unhandled by clients.
    Move,
    /// The game ended; `loser` names the defeated participant.
    End {
        loser: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
    /// The server rejected a command or hit a game-level problem.
    Error { msg: String },
    /// Any record whose tag is not in the closed set above.
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// The closed set of outbound command records.
///
/// Tagged the same way as [`ServerEvent`]: one JSON object per command
/// with a lowercase `"type"` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Authenticate into the room with an invite token.
    Connect { invite: String },
    /// Send a chat line.
    Chat { content: String },
    /// Replace the room configuration. Always carries the full intended
    /// conf, never a partial diff.
    Conf { conf: RoomConf },
    /// Start the game.
    Start,
    /// Forfeit the game.
    Gg,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is fixed by the server; these tests pin the exact
    //! JSON shapes so a serde attribute change cannot silently break
    //! interop.

    use super::*;

    fn conf_fixture() -> RoomConf {
        RoomConf {
            name: "r1".into(),
            black: UserId::UNASSIGNED,
            white: UserId::UNASSIGNED,
            king: UserId(7),
            rule: GameRule::default(),
            map: "basic".into(),
        }
    }

    // =====================================================================
    // UserId
    // =====================================================================

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_user_id_sentinel_round_trip() {
        let json = serde_json::to_string(&UserId::UNASSIGNED).unwrap();
        assert_eq!(json, "-1");
        let back: UserId = serde_json::from_str("-1").unwrap();
        assert!(!back.is_assigned());
    }

    #[test]
    fn test_user_id_is_assigned() {
        assert!(UserId(0).is_assigned());
        assert!(UserId(3).is_assigned());
        assert!(!UserId(-1).is_assigned());
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId(7).to_string(), "U-7");
    }

    // =====================================================================
    // RoomConf
    // =====================================================================

    #[test]
    fn test_conf_new_has_empty_seats() {
        let conf = RoomConf::new("arena", UserId(3));
        assert_eq!(conf.black, UserId::UNASSIGNED);
        assert_eq!(conf.white, UserId::UNASSIGNED);
        assert_eq!(conf.king, UserId(3));
    }

    #[test]
    fn test_conf_validate_rejects_same_seated_user() {
        let mut conf = conf_fixture();
        conf.black = UserId(3);
        conf.white = UserId(3);
        assert!(!conf.validate());
    }

    #[test]
    fn test_conf_validate_allows_both_unassigned() {
        assert!(conf_fixture().validate());
    }

    #[test]
    fn test_conf_validate_allows_distinct_seats() {
        let mut conf = conf_fixture();
        conf.black = UserId(3);
        conf.white = UserId(9);
        assert!(conf.validate());
    }

    #[test]
    fn test_merged_overrides_patch_fields_only() {
        let conf = conf_fixture();
        let merged = conf.merged(&ConfPatch::black(UserId(3)));

        assert_eq!(merged.black, UserId(3));
        // Everything else is retained.
        assert_eq!(merged.white, conf.white);
        assert_eq!(merged.king, conf.king);
        assert_eq!(merged.name, conf.name);
        assert_eq!(merged.rule, conf.rule);
        assert_eq!(merged.map, conf.map);
    }

    #[test]
    fn test_merged_with_empty_patch_is_identity() {
        let conf = conf_fixture();
        assert_eq!(conf.merged(&ConfPatch::default()), conf);
    }

    #[test]
    fn test_matches_detects_single_field_difference() {
        let conf = conf_fixture();
        let mut other = conf.clone();
        assert!(conf.matches(&other));

        other.white = UserId(9);
        assert!(!conf.matches(&other));
    }

    // =====================================================================
    // ServerEvent JSON shapes
    // =====================================================================

    #[test]
    fn test_enter_event_json_shape() {
        let ev: ServerEvent =
            serde_json::from_str(r#"{"type":"enter","user":5}"#).unwrap();
        assert_eq!(ev, ServerEvent::Enter { user: UserId(5) });
    }

    #[test]
    fn test_chat_event_json_shape() {
        let ev: ServerEvent = serde_json::from_str(
            r#"{"type":"chat","user":2,"content":"hi"}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ServerEvent::Chat {
                user: UserId(2),
                content: "hi".into()
            }
        );
    }

    #[test]
    fn test_connect_event_carries_snapshot() {
        let json = serde_json::json!({
            "type": "connect",
            "room": {
                "id": "room-1",
                "created_at": 1_700_000_000_000_i64,
                "conf": conf_fixture(),
                "users": [7],
                "ingame": false,
            },
        });
        let ev: ServerEvent = serde_json::from_value(json).unwrap();
        match ev {
            ServerEvent::Connect { room } => {
                assert_eq!(room.id, "room-1");
                assert_eq!(room.users, vec![UserId(7)]);
                assert!(!room.ingame);
            }
            other => panic!("expected connect, got {other:?}"),
        }
    }

    #[test]
    fn test_start_event_json_shape() {
        let json = serde_json::json!({
            "type": "start",
            "black": 1,
            "white": 2,
            "turn": "black",
            "board": [["o", "."], [".", "x"]],
        });
        let ev: ServerEvent = serde_json::from_value(json).unwrap();
        match ev {
            ServerEvent::Start {
                black,
                white,
                turn,
                board,
            } => {
                assert_eq!(black, UserId(1));
                assert_eq!(white, UserId(2));
                assert_eq!(turn, Turn::Black);
                assert_eq!(board[0][0], "o");
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn test_end_event_without_cause() {
        let ev: ServerEvent =
            serde_json::from_str(r#"{"type":"end","loser":1}"#).unwrap();
        assert_eq!(
            ev,
            ServerEvent::End {
                loser: UserId(1),
                cause: None
            }
        );
    }

    #[test]
    fn test_error_event_json_shape() {
        let ev: ServerEvent =
            serde_json::from_str(r#"{"type":"error","msg":"denied"}"#)
                .unwrap();
        assert_eq!(ev, ServerEvent::Error { msg: "denied".into() });
    }

    #[test]
    fn test_move_event_ignores_payload() {
        // The reserved move event may carry arbitrary fields; receipt
        // must never fail.
        let ev: ServerEvent = serde_json::from_str(
            r#"{"type":"move","start":{"x":0},"dir":{"x":1}}"#,
        )
        .unwrap();
        assert_eq!(ev, ServerEvent::Move);
    }

    #[test]
    fn test_unknown_event_kind_decodes_to_unknown() {
        let ev: ServerEvent =
            serde_json::from_str(r#"{"type":"ban","user":3}"#).unwrap();
        assert_eq!(ev, ServerEvent::Unknown);
    }

    // =====================================================================
    // ClientCommand JSON shapes
    // =====================================================================

    #[test]
    fn test_connect_command_json_shape() {
        let json = serde_json::to_value(ClientCommand::Connect {
            invite: "tok".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "connect");
        assert_eq!(json["invite"], "tok");
    }

    #[test]
    fn test_chat_command_json_shape() {
        let json = serde_json::to_value(ClientCommand::Chat {
            content: "gl hf".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "chat");
        assert_eq!(json["content"], "gl hf");
    }

    #[test]
    fn test_conf_command_carries_full_conf() {
        let json = serde_json::to_value(ClientCommand::Conf {
            conf: conf_fixture(),
        })
        .unwrap();
        assert_eq!(json["type"], "conf");
        // Every conf field is present on the wire, not a diff.
        let conf = &json["conf"];
        for key in ["name", "black", "white", "king", "rule", "map"] {
            assert!(!conf[key].is_null(), "missing conf key {key}");
        }
    }

    #[test]
    fn test_start_command_is_bare_record() {
        let json = serde_json::to_value(ClientCommand::Start).unwrap();
        assert_eq!(json, serde_json::json!({"type": "start"}));
    }

    #[test]
    fn test_gg_command_is_bare_record() {
        let json = serde_json::to_value(ClientCommand::Gg).unwrap();
        assert_eq!(json, serde_json::json!({"type": "gg"}));
    }
}
