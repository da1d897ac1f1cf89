//! Least Count rules and room state.
//!
//! This crate knows nothing about sockets or tasks. It holds the cards, the
//! scoring rules, and [`GameRoom`], the state machine every room runs.
//!
//! # Key types
//!
//! - [`GameRoom`]: applies player actions to one room's state
//! - [`GameState`]: what clients see (minus the deck order and tokens)
//! - [`GameSettings`]: host-chosen end condition and turn timer
//! - [`GameError`]: why an action was rejected

mod card;
pub mod deck;
mod error;
mod game;
mod ids;
mod settings;
mod state;

pub use card::{Card, CardId, Rank, Suit};
pub use error::GameError;
pub use game::{
    AutoPlayOutcome, BAD_SHOW_PENALTY, DiscardOutcome, GameRoom, HAND_SIZE, MAX_PLAYERS,
    MIN_PLAYERS, NewPlayer, SHOW_LIMIT,
};
pub use ids::{ConnectionId, PlayerId, PlayerToken, RoomCode};
pub use settings::{EndCondition, GamePhase, GameSettings};
pub use state::{
    DrawSource, FinalScore, GameState, Player, PlayerRoundScore, RoundSummary, ShowOutcome,
};
