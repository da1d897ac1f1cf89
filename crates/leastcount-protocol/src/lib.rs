//! Wire protocol for the Least Count server.
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`Reply`], [`RoomEvent`]):
//!   the frames that cross the socket.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ⇄ types.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or rooms. It only
//! describes and (de)serializes messages.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Envelope, Reply, ReplyData, Request, RoomEvent, ServerPayload, ServerStats,
};
