//! Validation errors for game actions.

use crate::card::CardId;
use crate::ids::PlayerId;
use crate::settings::GamePhase;
use crate::state::DrawSource;

/// Why a game action was rejected.
///
/// Every variant is a validation failure: the room state is untouched and
/// only the acting client hears about it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),

    #[error("{0} is not in the player's hand")]
    CardNotInHand(CardId),

    #[error("no cards selected")]
    EmptySelection,

    /// Cards discarded together must share a rank.
    #[error("discarded cards must all have the same rank")]
    RankMismatch,

    #[error("hand value {value} is above the show limit of {limit}")]
    HandTooHigh { value: u32, limit: u32 },

    #[error("room is full")]
    RoomFull,

    #[error("game has already started")]
    GameAlreadyStarted,

    /// The connection or token already holds a seat in this room.
    #[error("already seated in this room")]
    AlreadyJoined,

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("only the host can do that")]
    NotHost(PlayerId),

    #[error("need at least {min} players, have {count}")]
    NotEnoughPlayers { count: usize, min: usize },

    #[error("action not allowed in phase {actual} (needs {expected})")]
    WrongPhase {
        expected: GamePhase,
        actual: GamePhase,
    },

    #[error("nothing to draw from the {0}")]
    EmptySource(DrawSource),

    /// Seats can't be removed while a game is underway.
    #[error("player {0} can't leave a game in progress")]
    SeatLocked(PlayerId),

    #[error("reconnection token not recognized")]
    InvalidToken,
}
