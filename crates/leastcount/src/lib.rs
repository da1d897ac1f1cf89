//! # Least Count
//!
//! Real-time server for the Least Count card game.
//!
//! Browser clients connect over WebSocket and exchange JSON
//! [`Envelope`](leastcount_protocol::Envelope)s. Every room runs as its own
//! actor inside [`leastcount_room`]; the server only routes requests to the
//! registry and streams each room's broadcasts back to its seats.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leastcount::prelude::*;
//!
//! # async fn run() -> Result<(), LeastCountError> {
//! let config = ServerConfig::from_env()?;
//! let server = LeastCountServerBuilder::from_config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod status;
pub mod telemetry;
pub mod transport;

pub use config::{DEFAULT_BIND, DEFAULT_IDLE_TIMEOUT, ServerConfig};
pub use error::LeastCountError;
pub use server::{LeastCountServer, LeastCountServerBuilder};

/// Everything needed to run a server or write a client test.
pub mod prelude {
    pub use crate::{LeastCountError, LeastCountServer, LeastCountServerBuilder, ServerConfig};
    pub use leastcount_game::{
        Card, CardId, DrawSource, EndCondition, GamePhase, GameSettings, PlayerId, Rank, RoomCode,
    };
    pub use leastcount_protocol::{ClientMessage, Envelope, Request};
    pub use leastcount_room::{RoomConfig, SweepPolicy};
}
