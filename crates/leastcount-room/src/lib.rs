//! Room lifecycle for the Least Count server.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! [`GameRoom`](leastcount_game::GameRoom) and turn clock.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates/deletes rooms, routes connections, sweeps
//!   stale rooms
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`] / [`SweepPolicy`]: registry settings and eviction rules
//! - [`RoomError`]: what went wrong, with an HTTP-style [`code`](RoomError::code)

mod config;
mod error;
mod manager;
mod room;

pub use config::{EvictReason, RoomConfig, SweepPolicy};
pub use error::RoomError;
pub use manager::{MAX_NAME_LEN, RoomManager};
pub use room::{
    ActionOutcome, Departure, EventSender, GameAction, RoomHandle, RoomInfo, Seated,
};
