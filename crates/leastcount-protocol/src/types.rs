//! Message types that travel between browser clients and the server.
//!
//! Client → server: an [`Envelope`] around a [`Request`], which pairs a
//! client-chosen id with one [`ClientMessage`].
//!
//! Server → client: an [`Envelope`] around a [`ServerPayload`]. That is
//! either the [`Reply`] to a request (same id) or a [`RoomEvent`] broadcast
//! to everyone seated in the caller's room.
//!
//! Field names are camelCase on the wire. Message tags are camelCase for
//! requests and kebab-case for room events.

use std::sync::Arc;

use leastcount_game::{
    Card, CardId, DrawSource, FinalScore, GameSettings, GameState, PlayerId, PlayerToken,
    RoomCode, RoundSummary,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Outer wrapper for every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Per-sender counter. Each side keeps its own.
    pub seq: u64,

    /// Milliseconds since the sender started.
    pub timestamp: u64,

    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn new(seq: u64, timestamp: u64, payload: P) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// One client action plus the id its reply will carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub message: ClientMessage,
}

/// Everything a client can ask for.
///
/// Internally tagged: `{ "type": "joinRoom", "roomCode": "K7Q2ZD", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Open a room with the caller as host. Missing settings fall back to
    /// the defaults.
    CreateRoom {
        player_name: String,
        #[serde(default)]
        settings: Option<GameSettings>,
    },

    JoinRoom {
        room_code: String,
        player_name: String,
    },

    /// Reclaim a seat after a reload or dropped connection.
    RejoinRoom {
        room_code: String,
        player_token: PlayerToken,
    },

    StartGame,

    DrawCard {
        source: DrawSource,
    },

    DiscardCards {
        card_ids: Vec<CardId>,
    },

    CallShow,

    StartNextRound,

    LeaveRoom,

    /// Liveness probe. Needs no room.
    Health,

    /// Server counters. Needs no room.
    Stats,
}

impl ClientMessage {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::RejoinRoom { .. } => "rejoinRoom",
            Self::StartGame => "startGame",
            Self::DrawCard { .. } => "drawCard",
            Self::DiscardCards { .. } => "discardCards",
            Self::CallShow => "callShow",
            Self::StartNextRound => "startNextRound",
            Self::LeaveRoom => "leaveRoom",
            Self::Health => "health",
            Self::Stats => "stats",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// What the server sends: a reply or a room broadcast.
///
/// Adjacently tagged: `{ "type": "reply", "data": { "id": 4, "reply": ... } }`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerPayload {
    Reply { id: u64, reply: Reply },
    Event(RoomEvent),
}

/// Outcome of one request. Sent only to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "camelCase")]
pub enum Reply {
    Ok(ReplyData),

    /// `code` follows HTTP conventions: 400 bad request, 403 not allowed,
    /// 404 not found, 409 conflicts with room state, 503 unavailable.
    Error { code: u16, reason: String },
}

impl Reply {
    pub fn ack() -> Self {
        Self::Ok(ReplyData::Ack)
    }

    pub fn error(code: u16, reason: impl Into<String>) -> Self {
        Self::Error {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Success payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReplyData {
    /// The token is only ever sent here and in [`Joined`](Self::Joined).
    RoomCreated {
        room_code: RoomCode,
        player_id: PlayerId,
        player_token: PlayerToken,
        state: Arc<GameState>,
    },

    Joined {
        room_code: RoomCode,
        player_id: PlayerId,
        player_token: PlayerToken,
        state: Arc<GameState>,
    },

    Rejoined {
        room_code: RoomCode,
        player_id: PlayerId,
        state: Arc<GameState>,
    },

    CardDrawn {
        card: Card,
    },

    Ack,

    Health {
        status: String,
        uptime_secs: u64,
    },

    Stats(ServerStats),
}

/// Counters returned by the stats query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub active_rooms: usize,
    pub connected_clients: usize,
    pub uptime_secs: u64,

    /// Resident set size, where the platform reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_rss_bytes: Option<u64>,
}

/// Broadcast to every connected seat in a room.
///
/// `{ "event": "game-state-update", "data": { "state": { ... } } }`.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RoomEvent {
    PlayerJoined {
        player_id: PlayerId,
        player_name: String,
        state: Arc<GameState>,
    },

    PlayerLeft {
        player_id: PlayerId,
        player_name: String,
        state: Arc<GameState>,
    },

    GameStarted {
        state: Arc<GameState>,
    },

    #[serde(rename = "game-state-update")]
    StateUpdate {
        state: Arc<GameState>,
    },

    RoundEnded {
        summary: RoundSummary,
        state: Arc<GameState>,
    },

    GameEnded {
        winner: Option<PlayerId>,
        winner_name: Option<String>,
        final_scores: Vec<FinalScore>,
        state: Arc<GameState>,
    },

    /// The named player's turn ran out and was auto-played.
    TurnTimeout {
        player_id: PlayerId,
        player_name: String,
    },

    PlayerDisconnected {
        player_id: PlayerId,
        player_name: String,
    },

    PlayerReconnected {
        player_id: PlayerId,
        player_name: String,
    },
}

impl RoomEvent {
    /// Wire name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayerJoined { .. } => "player-joined",
            Self::PlayerLeft { .. } => "player-left",
            Self::GameStarted { .. } => "game-started",
            Self::StateUpdate { .. } => "game-state-update",
            Self::RoundEnded { .. } => "round-ended",
            Self::GameEnded { .. } => "game-ended",
            Self::TurnTimeout { .. } => "turn-timeout",
            Self::PlayerDisconnected { .. } => "player-disconnected",
            Self::PlayerReconnected { .. } => "player-reconnected",
        }
    }
}
