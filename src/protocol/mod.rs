//! Wire protocol: one JSON object per newline-terminated frame.

pub mod envelope;
pub mod framing;
pub mod game_info;

pub use envelope::{ComposeCardRequest, Credentials, Envelope, PlayCardRequest, Response};
pub use framing::read_frame;
pub use game_info::{DamageKind, DamageRecord, OtherPlayer, PlayerGameInfo, Round};

use uuid::Uuid;

/// Server-generated, opaque session identifier.
pub type SessionId = Uuid;

/// Identifier of a game room.
pub type RoomId = Uuid;

/// Inbound command tags recognized by the dispatcher.
pub mod commands {
    pub const USER_REGISTER: &str = "UserRegister";
    pub const USER_LOGIN: &str = "UserLogin";
    pub const USER_READY: &str = "UserReady";
    /// Re-enter the ready queue after a finished game; same semantics as
    /// `UserReady`.
    pub const USER_RESTART: &str = "UserRestart";
    pub const USER_PLAY_CARD: &str = "UserPlayCard";
    pub const USER_COMPOSE_CARD: &str = "UserComposeCard";
}

/// Response-code ids (the `code` field of every outbound frame). The table
/// itself is loaded from the store at startup; these constants only name the
/// ids the server logic selects between.
pub mod codes {
    /// Welcome frame pushed on accept.
    pub const WELCOME: i64 = 1001;
    /// Final per-player snapshot at game end.
    pub const GAME_OVER: i64 = 1101;

    pub const LOGIN_OK: i64 = 2001;
    pub const LOGIN_DECODE: i64 = 2002;
    pub const LOGIN_MISSING_FIELDS: i64 = 2003;
    pub const LOGIN_BACKEND: i64 = 2004;
    pub const LOGIN_INVALID: i64 = 2005;

    pub const REGISTER_OK: i64 = 3001;
    pub const REGISTER_DECODE: i64 = 3002;
    pub const REGISTER_MISSING_FIELDS: i64 = 3003;
    pub const REGISTER_EXISTS: i64 = 3004;
    pub const REGISTER_FAILED: i64 = 3005;

    pub const READY_OK: i64 = 4001;
    pub const NOT_LOGGED_IN: i64 = 4002;
    pub const SESSION_MISSING: i64 = 4003;
    /// Play data failed to decode. Shares the id of `NOT_LOGGED_IN`; the id
    /// reuse is part of the deployed wire contract.
    pub const PLAY_DECODE: i64 = 4002;

    pub const GAME_START: i64 = 5001;
    pub const BOND_CATALOG: i64 = 5002;
    pub const PLAY_REJECTED: i64 = 5005;
    pub const PLAY_EMPTY: i64 = 5009;

    pub const RECONNECT_OK: i64 = 6001;
    pub const RECONNECT_FAILED: i64 = 6002;

    pub const PEER_OFFLINE: i64 = 7001;
    pub const PEER_RECONNECTED: i64 = 7002;

    pub const PLAY_BROADCAST: i64 = 8001;
    pub const COMPOSE_BROADCAST: i64 = 9001;
    pub const COMPOSE_REJECTED: i64 = 9002;

    /// Compose request without a room id. Historic reuse of the login-family
    /// ids, preserved verbatim.
    pub const COMPOSE_MISSING_ROOM: i64 = 2001;
    pub const COMPOSE_EMPTY: i64 = 2002;
    pub const COMPOSE_NOT_TRIPLE: i64 = 2003;

    /// Malformed frame or unknown command.
    pub const UNKNOWN_COMMAND: i64 = 9999;
}
