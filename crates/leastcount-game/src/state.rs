//! Room state as seen by clients, plus round and game summaries.
//!
//! These types are serialized into every state broadcast. Two fields are
//! deliberately kept off the wire: each player's reconnection token and the
//! order of the draw pile (only its size goes out as `deckCount`).

use serde::{Deserialize, Serialize};

use crate::card::{Card, Rank};
use crate::ids::{ConnectionId, PlayerId, PlayerToken, RoomCode};
use crate::settings::{GamePhase, GameSettings};

/// Which pile a draw takes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawSource {
    Deck,
    Discard,
}

impl std::fmt::Display for DrawSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deck => write!(f, "deck"),
            Self::Discard => write!(f, "discard"),
        }
    }
}

/// One seat at the table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,

    #[serde(skip)]
    pub token: PlayerToken,

    /// Last connection bound to this seat. Only meaningful while
    /// `is_connected` is true.
    #[serde(skip)]
    pub connection: ConnectionId,

    pub name: String,
    pub hand: Vec<Card>,

    /// Score per round; index `n` is round `n + 1`.
    pub round_scores: Vec<u32>,
    pub total_score: u32,
    pub is_eliminated: bool,
    pub is_connected: bool,
    pub is_host: bool,
}

/// The authoritative state of one room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub room_code: RoomCode,
    pub players: Vec<Player>,

    /// Seating fixed at game start. Turns move backward through it.
    pub player_order: Vec<PlayerId>,
    pub current_round: u32,

    #[serde(skip)]
    pub deck: Vec<Card>,

    /// Size of `deck`. Filled in when a snapshot is taken.
    pub deck_count: usize,

    /// Drawable pile; the last element is the top.
    pub discard_pile: Vec<Card>,

    /// Cards thrown this turn. Not drawable until the turn ends.
    pub current_turn_discard_pile: Vec<Card>,
    pub wild_card_rank: Option<Rank>,
    pub current_turn_player_id: Option<PlayerId>,
    pub round_start_player_id: Option<PlayerId>,
    pub game_phase: GamePhase,
    pub host_id: PlayerId,
    pub settings: GameSettings,

    /// Unix milliseconds at which the current turn began.
    pub turn_start_time: Option<u64>,

    /// Turn limit in milliseconds, 0 when the timer is off.
    pub turn_time_limit_ms: u64,

    /// Set when the previous turn ended with a matching discard, so no draw
    /// happened.
    pub skip_draw_this_turn: bool,
}

impl GameState {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Top card of the drawable discard pile.
    pub fn discard_top(&self) -> Option<&Card> {
        self.discard_pile.last()
    }
}

/// Result of a show call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowOutcome {
    pub player_id: PlayerId,
    pub hand_total: u32,
    pub is_good_show: bool,
    pub lowest_hand_total: u32,
}

/// One player's line in a round summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRoundScore {
    pub player_id: PlayerId,
    pub player_name: String,
    pub hand_total: u32,
    pub round_score: u32,
    pub total_score: u32,
    pub is_eliminated: bool,
}

/// Everything clients need to render the end of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub round: u32,
    pub scores: Vec<PlayerRoundScore>,
    pub show_result: Option<ShowOutcome>,
    pub wild_card_rank: Option<Rank>,
    pub game_over: bool,
}

impl RoundSummary {
    pub fn score_of(&self, id: PlayerId) -> Option<&PlayerRoundScore> {
        self.scores.iter().find(|s| s.player_id == id)
    }
}

/// A player's final total, sent with the game-ended broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub player_id: PlayerId,
    pub player_name: String,
    pub total_score: u32,
}
