//! Error types for the room layer.

use leastcount_game::{GameError, RoomCode};

/// Errors from the registry or a room actor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The connection holds no seat in any room.
    #[error("not seated in a room")]
    NotSeated,

    /// Blank after trimming.
    #[error("player name must not be empty")]
    InvalidName,

    /// The connection already holds a seat; leave first.
    #[error("already seated in room {0}")]
    AlreadySeated(RoomCode),

    /// The game rejected the action.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The room's actor has stopped or its queue is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// HTTP-style status code sent back to the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::NotSeated | Self::InvalidName => 400,
            Self::AlreadySeated(_) => 409,
            Self::Unavailable(_) => 503,
            Self::Game(e) => match e {
                GameError::CardNotInHand(_)
                | GameError::EmptySelection
                | GameError::RankMismatch
                | GameError::HandTooHigh { .. } => 400,
                GameError::NotHost(_) | GameError::InvalidToken => 403,
                GameError::PlayerNotFound(_) => 404,
                GameError::NotYourTurn(_)
                | GameError::RoomFull
                | GameError::GameAlreadyStarted
                | GameError::AlreadyJoined
                | GameError::NotEnoughPlayers { .. }
                | GameError::WrongPhase { .. }
                | GameError::EmptySource(_)
                | GameError::SeatLocked(_) => 409,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use leastcount_game::{GamePhase, PlayerId};

    use super::*;

    #[test]
    fn test_code_for_registry_errors() {
        let code = RoomCode::parse("ABCDEF");
        assert_eq!(RoomError::NotFound(code.clone()).code(), 404);
        assert_eq!(RoomError::NotSeated.code(), 400);
        assert_eq!(RoomError::InvalidName.code(), 400);
        assert_eq!(RoomError::AlreadySeated(code.clone()).code(), 409);
        assert_eq!(RoomError::Unavailable(code).code(), 503);
    }

    #[test]
    fn test_code_for_game_errors() {
        assert_eq!(RoomError::from(GameError::RankMismatch).code(), 400);
        assert_eq!(RoomError::from(GameError::NotHost(PlayerId(2))).code(), 403);
        assert_eq!(RoomError::from(GameError::NotYourTurn(PlayerId(2))).code(), 409);
        let phase = GameError::WrongPhase {
            expected: GamePhase::Playing,
            actual: GamePhase::Lobby,
        };
        assert_eq!(RoomError::from(phase).code(), 409);
    }

    #[test]
    fn test_game_error_message_passes_through() {
        let err = RoomError::from(GameError::RoomFull);
        assert_eq!(err.to_string(), "room is full");
    }
}
